//! Document Loader
//!
//! Drives one load cycle: header, cross-reference chain (with brute-force
//! recovery when the chain is corrupt), then a worklist traversal of the
//! reachable object graph. Each object number parses at most once per load;
//! repeated references and cycles hit the memo cache. Event listeners are
//! notified synchronously as objects parse, and per content-stream operator
//! once the page tree is materialized.

use super::context::ParseContext;
use super::header::PdfHeader;
use super::lexer::Lexer;
use super::object_stream::ObjectStream;
use super::objects::parse_indirect_object;
use super::recovery;
use super::trailer::Trailer;
use super::xref::{XRefEntry, XRefTable};
use super::{content::ContentParser, ParseError, ParseOptions, ParseResult};
use crate::document::Document;
use crate::events::{EventHub, ListenerFlow, ObjectLocation};
use crate::objects::{ObjectId, PdfObject};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufReader, Read, Seek};
use tracing::{debug, warn};

/// Load a document from a seekable byte source, notifying `hub` along the
/// way.
pub fn load_document<R: Read + Seek>(
    source: R,
    options: ParseOptions,
    hub: &mut EventHub<'_, '_>,
) -> ParseResult<Document> {
    let mut loader = DocumentLoader::open(source, options)?;
    loader.run(hub)
}

struct DocumentLoader<R: Read + Seek> {
    reader: BufReader<R>,
    header: PdfHeader,
    xref: XRefTable,
    trailer: Trailer,
    cache: HashMap<u32, PdfObject>,
    generations: HashMap<u32, u16>,
    containers: HashMap<u32, ObjectStream>,
    options: ParseOptions,
}

impl<R: Read + Seek> DocumentLoader<R> {
    /// Bootstrap: header, cross-reference chain, trailer record. A corrupt
    /// chain falls back to the full-file recovery scan before giving up.
    fn open(source: R, options: ParseOptions) -> ParseResult<Self> {
        let mut reader = BufReader::new(source);

        let header = PdfHeader::parse(&mut reader)?;
        debug!(version = %header.version, "parsed header");

        let xref = match XRefTable::build(&mut reader, &options) {
            Ok(table) if table.trailer().is_some() => table,
            Ok(_) => {
                warn!("cross-reference chain carried no trailer, engaging recovery scan");
                recovery::rebuild_xref(&mut reader)?
            }
            Err(ParseError::Io(e)) => return Err(ParseError::Io(e)),
            Err(e) => {
                warn!(error = %e, "cross-reference chain unusable, engaging recovery scan");
                recovery::rebuild_xref(&mut reader)?
            }
        };

        let trailer = xref
            .trailer()
            .map(Trailer::from_dict)
            .unwrap_or_default();

        Ok(Self {
            reader,
            header,
            xref,
            trailer,
            cache: HashMap::new(),
            generations: HashMap::new(),
            containers: HashMap::new(),
            options,
        })
    }

    fn run(&mut self, hub: &mut EventHub<'_, '_>) -> ParseResult<Document> {
        if self.trailer.root.is_none() {
            self.trailer.root = self.find_catalog(hub)?;
        }
        self.trailer.validate()?;

        self.traverse_reachable(hub)?;

        if !hub.is_empty() {
            self.notify_content_operators(hub)?;
        }

        let mut document = Document::with_version(self.header.version);
        document.set_trailer(self.trailer);
        for (number, object) in self.cache.drain() {
            let generation = self.generations.get(&number).copied().unwrap_or(0);
            document.insert_object(ObjectId::new(number, generation), object);
        }
        Ok(document)
    }

    /// Breadth-first walk of every object reachable from the trailer.
    /// Back-edges land in the seen set, so cycles terminate and resolve to
    /// the already-cached object.
    fn traverse_reachable(&mut self, hub: &mut EventHub<'_, '_>) -> ParseResult<()> {
        let mut queue: VecDeque<u32> = VecDeque::new();
        let mut seen: HashSet<u32> = HashSet::new();

        for id in [self.trailer.root, self.trailer.info].into_iter().flatten() {
            if seen.insert(id.number()) {
                queue.push_back(id.number());
            }
        }

        while let Some(number) = queue.pop_front() {
            self.ensure_object(number, hub)?;

            let mut references = Vec::new();
            if let Some(object) = self.cache.get(&number) {
                object.collect_references(&mut references);
            }
            for id in references {
                if seen.insert(id.number()) {
                    queue.push_back(id.number());
                }
            }
        }

        Ok(())
    }

    /// Memoized resolution: parse the object behind `number` once and cache
    /// it. Unresolvable or free entries degrade to Null, never a failure.
    fn ensure_object(&mut self, number: u32, hub: &mut EventHub<'_, '_>) -> ParseResult<()> {
        if self.cache.contains_key(&number) {
            return Ok(());
        }

        let entry = match self.xref.get(number) {
            Some(entry) => *entry,
            None => {
                warn!(number, "reference to unknown object resolves to null");
                self.cache.insert(number, PdfObject::Null);
                return Ok(());
            }
        };

        match entry {
            XRefEntry::Free { .. } => {
                self.cache.insert(number, PdfObject::Null);
                Ok(())
            }
            XRefEntry::InUse { offset, generation } => {
                self.parse_at_offset(number, generation, offset, hub)
            }
            XRefEntry::Compressed { container, index } => {
                self.parse_from_container(number, container, index, hub)
            }
        }
    }

    fn parse_at_offset(
        &mut self,
        number: u32,
        generation: u16,
        offset: u64,
        hub: &mut EventHub<'_, '_>,
    ) -> ParseResult<()> {
        self.reader.seek(std::io::SeekFrom::Start(offset))?;
        let mut lexer = Lexer::new_at(&mut self.reader, offset);
        let mut ctx = ParseContext::with_max_depth(self.options.max_depth);

        let expected = ObjectId::new(number, generation);
        let parsed = parse_indirect_object(&mut lexer, Some(expected), &mut ctx, &self.options);

        let (id, object) = match parsed {
            Ok(result) => result,
            Err(e @ ParseError::Cancelled) => return Err(e),
            Err(e) if self.options.lenient => {
                warn!(number, error = %e, "object body unparseable, resolves to null");
                self.cache.insert(number, PdfObject::Null);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.generations.insert(number, id.generation());
        self.cache.insert(number, object);

        let location = ObjectLocation { id, offset };
        if hub.object_parsed(&self.cache[&number], location) == ListenerFlow::Stop {
            return Err(ParseError::Cancelled);
        }
        Ok(())
    }

    fn parse_from_container(
        &mut self,
        number: u32,
        container: u32,
        index: u32,
        hub: &mut EventHub<'_, '_>,
    ) -> ParseResult<()> {
        // A container must itself be a plain in-use object; anything else
        // would loop the resolution
        let container_offset = match self.xref.get(container) {
            Some(XRefEntry::InUse { offset, .. }) => *offset,
            _ => {
                warn!(number, container, "compressed entry names an invalid container");
                self.cache.insert(number, PdfObject::Null);
                return Ok(());
            }
        };

        self.ensure_object(container, hub)?;

        if !self.containers.contains_key(&container) {
            let stream = match self.cache.get(&container).and_then(|obj| obj.as_stream()) {
                Some(stream) => stream,
                None => {
                    warn!(container, "object container is not a stream");
                    self.cache.insert(number, PdfObject::Null);
                    return Ok(());
                }
            };
            match ObjectStream::parse(stream, &self.options) {
                Ok(parsed) => {
                    self.containers.insert(container, parsed);
                }
                Err(e) if self.options.lenient => {
                    warn!(container, error = %e, "object container unparseable");
                    self.cache.insert(number, PdfObject::Null);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        let object = self.containers[&container]
            .get(number)
            .cloned()
            .unwrap_or_else(|| {
                warn!(number, container, index, "object missing from its container");
                PdfObject::Null
            });

        let was_null = object.is_null();
        self.generations.insert(number, 0);
        self.cache.insert(number, object);

        if !was_null {
            let location = ObjectLocation {
                id: ObjectId::new(number, 0),
                offset: container_offset,
            };
            if hub.object_parsed(&self.cache[&number], location) == ListenerFlow::Stop {
                return Err(ParseError::Cancelled);
            }
        }
        Ok(())
    }

    /// Recovery fallback when no trailer names a root: the first object whose
    /// dictionary says `/Type /Catalog` wins.
    fn find_catalog(&mut self, hub: &mut EventHub<'_, '_>) -> ParseResult<Option<ObjectId>> {
        for number in self.xref.in_use_numbers() {
            self.ensure_object(number, hub)?;
            let is_catalog = self
                .cache
                .get(&number)
                .and_then(|obj| obj.as_dict())
                .map(|dict| dict.get_type() == Some("Catalog"))
                .unwrap_or(false);
            if is_catalog {
                let generation = self.generations.get(&number).copied().unwrap_or(0);
                debug!(number, "recovered document root by catalog scan");
                return Ok(Some(ObjectId::new(number, generation)));
            }
        }
        Ok(None)
    }

    /// Resolve through the cache without parsing anything new.
    fn cached<'a>(&'a self, object: &'a PdfObject) -> &'a PdfObject {
        static NULL_OBJECT: PdfObject = PdfObject::Null;
        match object {
            PdfObject::Reference(id) => self.cache.get(&id.number()).unwrap_or(&NULL_OBJECT),
            other => other,
        }
    }

    /// Walk the page tree and fan out one event per content-stream operator.
    fn notify_content_operators(&mut self, hub: &mut EventHub<'_, '_>) -> ParseResult<()> {
        let pages = self.collect_pages();

        for page_number in pages {
            let streams = self.page_content_streams(page_number);
            for data in streams {
                let operations = match ContentParser::parse(&data) {
                    Ok(ops) => ops,
                    Err(e) if self.options.lenient => {
                        warn!(page = page_number, error = %e, "content stream unparseable");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for op in &operations {
                    if hub.content_operator(&op.operator, &op.operands) == ListenerFlow::Stop {
                        return Err(ParseError::Cancelled);
                    }
                }
            }
        }
        Ok(())
    }

    /// Page objects in tree order, cycle-guarded.
    fn collect_pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        let mut visited: HashSet<u32> = HashSet::new();

        let root_dict = match self
            .trailer
            .root
            .and_then(|id| self.cache.get(&id.number()))
            .and_then(|obj| obj.as_dict())
        {
            Some(dict) => dict,
            None => return pages,
        };
        let mut stack: Vec<u32> = match root_dict.get("Pages").and_then(|p| p.as_reference()) {
            Some(id) => vec![id.number()],
            None => return pages,
        };

        while let Some(number) = stack.pop() {
            if !visited.insert(number) {
                continue;
            }
            let dict = match self.cache.get(&number).and_then(|obj| obj.as_dict()) {
                Some(dict) => dict,
                None => continue,
            };
            match dict.get_type() {
                Some("Pages") => {
                    if let Some(kids) = dict.get("Kids").and_then(|k| k.as_array()) {
                        // Reverse keeps tree order on the stack
                        for kid in kids.iter().rev() {
                            if let Some(id) = kid.as_reference() {
                                stack.push(id.number());
                            }
                        }
                    }
                }
                Some("Page") => pages.push(number),
                _ => {}
            }
        }

        pages
    }

    /// Decoded content stream payloads of one page.
    fn page_content_streams(&self, page_number: u32) -> Vec<Vec<u8>> {
        let mut payloads = Vec::new();

        let contents = match self
            .cache
            .get(&page_number)
            .and_then(|obj| obj.as_dict())
            .and_then(|dict| dict.get("Contents"))
        {
            Some(contents) => contents,
            None => return payloads,
        };

        let parts: Vec<&PdfObject> = match self.cached(contents) {
            PdfObject::Array(array) => array.iter().collect(),
            single => vec![single],
        };

        for part in parts {
            match self.cached(part).as_stream() {
                Some(stream) => match crate::filters::decode_stream(
                    &stream.data,
                    &stream.dict,
                    self.options.lenient,
                ) {
                    Ok(data) => payloads.push(data),
                    Err(e) => {
                        warn!(page = page_number, error = %e, "content stream failed to decode");
                    }
                },
                None => {
                    warn!(page = page_number, "page contents entry is not a stream");
                }
            }
        }

        payloads
    }
}
