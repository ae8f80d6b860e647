//! End-to-end pipeline properties: load/dump round trips, incremental
//! updates, corruption recovery, listener behavior.

use pretty_assertions::{assert_eq, assert_ne};
use quill_pdf::events::{EventListener, ListenerFlow, ObjectLocation};
use quill_pdf::filters::Filter;
use quill_pdf::{
    dump, load, load_with_listeners, Document, ObjectId, PdfArray, PdfDictionary, PdfError,
    PdfName, PdfObject, PdfStream, PdfString,
};
use std::io::Cursor;

/// Assemble object bodies into a well-formed file with a classic table.
fn build_pdf(objects: &[(u32, &str)]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");

    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let xref_offset = out.len();
    let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    out.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for number in 1..=max {
        match offsets.iter().find(|(n, _)| *n == number) {
            Some((_, offset)) => out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes()),
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            max + 1
        )
        .as_bytes(),
    );
    out
}

/// A document exercising every supported object kind, all reachable from
/// the root.
fn kitchen_sink_document() -> Document {
    let mut doc = Document::new();

    let stream_id = doc.add_object(PdfObject::Stream(
        PdfStream::with_filters(
            PdfDictionary::new(),
            b"stream payload that should compress and survive",
            &[Filter::FlateDecode, Filter::ASCIIHexDecode],
        )
        .unwrap(),
    ));

    let mut inner = PdfDictionary::new();
    inner.insert("Kind", PdfObject::Name(PdfName::new("Inner")));
    inner.insert("Stream", PdfObject::Reference(stream_id));
    let inner_id = doc.add_object(PdfObject::Dictionary(inner));

    let mut catalog = PdfDictionary::new();
    catalog.insert("Type", PdfObject::Name(PdfName::new("Catalog")));
    catalog.insert("Flag", PdfObject::Boolean(true));
    catalog.insert("Count", PdfObject::Integer(-42));
    catalog.insert("Scale", PdfObject::Real(0.75));
    catalog.insert("Nothing", PdfObject::Null);
    catalog.insert(
        "Title",
        PdfObject::String(PdfString::new(&b"parens (nested) and \\ slash \xFF"[..])),
    );
    catalog.insert("Odd Name", PdfObject::Name(PdfName::new("With Space")));
    catalog.insert(
        "Mixed",
        PdfObject::Array(PdfArray(vec![
            PdfObject::Integer(1),
            PdfObject::Real(2.5),
            PdfObject::Reference(inner_id),
            PdfObject::Array(PdfArray(vec![PdfObject::Name(PdfName::new("Deep"))])),
        ])),
    );
    let root = doc.add_object(PdfObject::Dictionary(catalog));
    doc.set_root(root);

    // Back-edge: the inner dictionary points at the catalog too
    let mut inner_with_cycle = doc.get(inner_id).unwrap().as_dict().unwrap().clone();
    inner_with_cycle.insert("Parent", PdfObject::Reference(root));
    doc.insert_object(inner_id, PdfObject::Dictionary(inner_with_cycle));

    doc
}

fn round_trip(doc: &Document) -> Document {
    let mut bytes = Vec::new();
    dump(&mut bytes, doc).expect("dump");
    load(Cursor::new(bytes)).expect("load")
}

#[test]
fn round_trip_preserves_kinds_values_and_topology() {
    let original = kitchen_sink_document();
    let reloaded = round_trip(&original);

    assert_eq!(reloaded.len(), original.len());
    assert_eq!(reloaded.root(), original.root());
    for (id, object) in original.iter_objects() {
        assert_eq!(reloaded.get(id), Some(object), "object {id} changed across the round trip");
    }
}

#[test]
fn round_trip_is_a_fixed_point() {
    let first = round_trip(&kitchen_sink_document());
    let second = round_trip(&first);
    assert_eq!(first, second);

    // And the bytes stabilize too
    let mut bytes_a = Vec::new();
    dump(&mut bytes_a, &first).unwrap();
    let mut bytes_b = Vec::new();
    dump(&mut bytes_b, &second).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn idempotent_parse_of_same_source() {
    let data = build_pdf(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R >>"),
    ]);

    let first = load(Cursor::new(data.clone())).unwrap();
    let second = load(Cursor::new(data)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn filter_round_trip_through_stream_dictionaries() {
    let payload = b"the logical payload".repeat(11);
    let stream = PdfStream::with_filters(
        PdfDictionary::new(),
        &payload,
        &[Filter::FlateDecode, Filter::ASCII85Decode],
    )
    .unwrap();

    // Encoded form differs, decode restores exactly
    assert_ne!(stream.raw_data(), &payload[..]);
    assert_eq!(stream.decoded().unwrap(), payload);

    // And the property survives serialization
    let mut doc = Document::new();
    let stream_id = doc.add_object(PdfObject::Stream(stream));
    let mut catalog = PdfDictionary::new();
    catalog.insert("S", PdfObject::Reference(stream_id));
    let root = doc.add_object(PdfObject::Dictionary(catalog));
    doc.set_root(root);

    let reloaded = round_trip(&doc);
    let reloaded_stream = reloaded.get(stream_id).unwrap().as_stream().unwrap();
    assert_eq!(reloaded_stream.decoded().unwrap(), payload);
}

#[test]
fn dangling_reference_degrades_to_null() {
    let data = build_pdf(&[(1, "<< /Type /Catalog /Ghost 40 0 R >>")]);
    let doc = load(Cursor::new(data)).unwrap();

    let ghost = doc.catalog().unwrap().get("Ghost").unwrap();
    assert!(doc.resolve(ghost).is_null());
}

#[test]
fn cyclic_graph_loads_and_dumps_without_recursion_blowup() {
    let data = build_pdf(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /Root 1 0 R >>"),
        (3, "<< /Type /Page /Parent 2 0 R >>"),
    ]);
    let doc = load(Cursor::new(data)).unwrap();

    // Both directions of the cycle resolve to cached arena slots
    let pages = doc.get_by_number(2).unwrap().as_dict().unwrap();
    assert_eq!(
        doc.resolve(pages.get("Root").unwrap()).as_dict().unwrap().get_type(),
        Some("Catalog")
    );

    // The writer emits each object exactly once despite the cycle
    let mut bytes = Vec::new();
    dump(&mut bytes, &doc).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(text.matches(" obj").count(), 3);
}

#[test]
fn incremental_update_wins_for_redefined_object_only() {
    // Base file defines objects 1 (catalog), 5 and 6; an appended update
    // redefines object 5 and chains back with /Prev.
    let mut data = build_pdf(&[
        (1, "<< /Type /Catalog /A 5 0 R /B 6 0 R >>"),
        (5, "(old five)"),
        (6, "(six)"),
    ]);
    let base_xref = data
        .windows(4)
        .position(|w| w == b"xref")
        .expect("base table");

    let update_body_offset = data.len();
    data.extend_from_slice(b"5 0 obj\n(new five)\nendobj\n");
    let update_xref_offset = data.len();
    data.extend_from_slice(
        format!(
            "xref\n5 1\n{update_body_offset:010} 00000 n \ntrailer\n<< /Size 7 /Root 1 0 R /Prev {base_xref} >>\nstartxref\n{update_xref_offset}\n%%EOF\n"
        )
        .as_bytes(),
    );

    let doc = load(Cursor::new(data)).unwrap();
    assert_eq!(
        doc.get_by_number(5).unwrap().as_string().unwrap().as_bytes(),
        b"new five"
    );
    // Untouched object still comes from the base section
    assert_eq!(
        doc.get_by_number(6).unwrap().as_string().unwrap().as_bytes(),
        b"six"
    );
}

#[test]
fn destroyed_xref_recovers_same_object_census() {
    let objects: &[(u32, &str)] = &[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R >>"),
    ];
    let pristine = build_pdf(objects);
    let healthy = load(Cursor::new(pristine.clone())).unwrap();

    let mut corrupted = pristine;
    let pos = corrupted.windows(4).position(|w| w == b"xref").unwrap();
    for byte in &mut corrupted[pos..pos + 4] {
        *byte = b'?';
    }

    let recovered = load(Cursor::new(corrupted)).unwrap();
    assert_eq!(recovered.len(), healthy.len());
    assert_eq!(
        recovered.catalog().and_then(|c| c.get_type()),
        Some("Catalog")
    );
}

#[test]
fn listeners_observe_objects_and_operators() {
    struct Census {
        objects: usize,
        operators: Vec<String>,
    }
    impl EventListener for Census {
        fn on_object_parsed(&mut self, _: &PdfObject, _: ObjectLocation) -> ListenerFlow {
            self.objects += 1;
            ListenerFlow::Continue
        }
        fn on_content_operator(&mut self, operator: &str, _: &[PdfObject]) -> ListenerFlow {
            self.operators.push(operator.to_string());
            ListenerFlow::Continue
        }
    }

    let data = build_pdf(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>"),
        (4, "<< /Length 20 >>\nstream\n1 0 0 1 10 10 cm q Q\nendstream"),
    ]);

    let mut census = Census { objects: 0, operators: Vec::new() };
    {
        let mut listeners: [&mut dyn EventListener; 1] = [&mut census];
        load_with_listeners(Cursor::new(data), &mut listeners).unwrap();
    }

    assert_eq!(census.objects, 4);
    assert_eq!(census.operators, vec!["cm", "q", "Q"]);
}

#[test]
fn listener_cancellation_yields_no_document() {
    struct StopImmediately;
    impl EventListener for StopImmediately {
        fn on_object_parsed(&mut self, _: &PdfObject, _: ObjectLocation) -> ListenerFlow {
            ListenerFlow::Stop
        }
    }

    let data = build_pdf(&[(1, "<< /Type /Catalog >>")]);
    let mut stopper = StopImmediately;
    let mut listeners: [&mut dyn EventListener; 1] = [&mut stopper];
    let result = load_with_listeners(Cursor::new(data), &mut listeners);
    assert!(matches!(result, Err(PdfError::Cancelled)));
}

#[test]
fn round_trip_through_the_filesystem() {
    use std::fs::File;
    use std::io::Write;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("roundtrip.pdf");

    let original = kitchen_sink_document();
    let mut bytes = Vec::new();
    dump(&mut bytes, &original).unwrap();
    File::create(&path).unwrap().write_all(&bytes).unwrap();

    let reloaded = load(File::open(&path).unwrap()).unwrap();
    assert_eq!(reloaded.len(), original.len());
    assert_eq!(reloaded.root(), original.root());
}

#[test]
fn generations_survive_round_trip() {
    let mut doc = Document::new();
    let mut catalog = PdfDictionary::new();
    catalog.insert("Next", PdfObject::Reference(ObjectId::new(2, 3)));
    doc.insert_object(ObjectId::new(1, 0), PdfObject::Dictionary(catalog));
    doc.insert_object(ObjectId::new(2, 3), PdfObject::Integer(99));
    doc.set_root(ObjectId::new(1, 0));

    let reloaded = round_trip(&doc);
    assert_eq!(
        reloaded.get(ObjectId::new(2, 3)).and_then(|o| o.as_integer()),
        Some(99)
    );
    // A stale-generation reference misses the arena and resolves null
    assert!(reloaded.get(ObjectId::new(2, 0)).is_none());
    assert!(reloaded
        .resolve(&PdfObject::Reference(ObjectId::new(2, 0)))
        .is_null());
}
