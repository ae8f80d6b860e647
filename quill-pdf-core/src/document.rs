//! Document
//!
//! A [`Document`] owns everything one load/dump cycle needs: the object
//! arena (object number → resolved object), and the trailer record naming
//! the root. Indirect references are indices into the arena, so cyclic
//! graphs carry no ownership cycles. Objects enter the arena either through
//! parsing or through programmatic construction; the cross-reference table
//! is derived again from scratch on every write pass, never stored here.

use crate::objects::{ObjectId, PdfDictionary, PdfObject};
use crate::parser::{PdfVersion, Trailer};
use std::collections::BTreeMap;

static NULL_OBJECT: PdfObject = PdfObject::Null;

/// One document's object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    version: PdfVersion,
    objects: BTreeMap<u32, (u16, PdfObject)>,
    trailer: Trailer,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document, PDF 1.7.
    pub fn new() -> Self {
        Self::with_version(PdfVersion::V1_7)
    }

    pub fn with_version(version: PdfVersion) -> Self {
        Self {
            version,
            objects: BTreeMap::new(),
            trailer: Trailer::default(),
        }
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub(crate) fn set_trailer(&mut self, trailer: Trailer) {
        self.trailer = trailer;
    }

    /// Reference to the document catalog.
    pub fn root(&self) -> Option<ObjectId> {
        self.trailer.root
    }

    pub fn set_root(&mut self, id: ObjectId) {
        self.trailer.root = Some(id);
    }

    /// Reference to the information dictionary.
    pub fn info(&self) -> Option<ObjectId> {
        self.trailer.info
    }

    pub fn set_info(&mut self, id: ObjectId) {
        self.trailer.info = Some(id);
    }

    /// Add an object under the next free object number.
    pub fn add_object(&mut self, object: PdfObject) -> ObjectId {
        let number = self.objects.keys().next_back().map(|n| n + 1).unwrap_or(1);
        let id = ObjectId::new(number, 0);
        self.objects.insert(number, (0, object));
        id
    }

    /// Insert an object under a specific identifier, replacing any previous
    /// object with that number.
    pub fn insert_object(&mut self, id: ObjectId, object: PdfObject) {
        self.objects.insert(id.number(), (id.generation(), object));
    }

    /// Look up an object; the generation must match the arena's.
    pub fn get(&self, id: ObjectId) -> Option<&PdfObject> {
        self.objects
            .get(&id.number())
            .filter(|(generation, _)| *generation == id.generation())
            .map(|(_, object)| object)
    }

    /// Look up by object number alone.
    pub fn get_by_number(&self, number: u32) -> Option<&PdfObject> {
        self.objects.get(&number).map(|(_, object)| object)
    }

    /// Look up by object number, returning the full identifier too.
    pub fn get_entry(&self, number: u32) -> Option<(ObjectId, &PdfObject)> {
        self.objects
            .get(&number)
            .map(|(generation, object)| (ObjectId::new(number, *generation), object))
    }

    /// Follow a reference into the arena. Non-references return themselves;
    /// a dangling or generation-stale reference degrades to Null.
    pub fn resolve<'a>(&'a self, object: &'a PdfObject) -> &'a PdfObject {
        match object {
            PdfObject::Reference(id) => self.get(*id).unwrap_or(&NULL_OBJECT),
            other => other,
        }
    }

    /// The catalog dictionary, when the root resolves to one.
    pub fn catalog(&self) -> Option<&PdfDictionary> {
        self.root().and_then(|id| self.get(id)).and_then(|obj| obj.as_dict())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate the arena in object-number order.
    pub fn iter_objects(&self) -> impl Iterator<Item = (ObjectId, &PdfObject)> {
        self.objects
            .iter()
            .map(|(number, (generation, object))| (ObjectId::new(*number, *generation), object))
    }

    /// Look up a dictionary key on an object, walking `/Parent` links when
    /// the object itself lacks it. This is how page-tree attributes
    /// (`MediaBox`, `Resources`, `Rotate`) inherit from ancestor nodes.
    /// Parent cycles terminate at the first repeated node.
    pub fn inherited_attribute(&self, id: ObjectId, key: &str) -> Option<&PdfObject> {
        let mut visited = std::collections::HashSet::new();
        let mut current = id;

        loop {
            if !visited.insert(current.number()) {
                return None;
            }
            let dict = self.get(current)?.as_dict()?;
            if let Some(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get("Parent")?.as_reference()?;
        }
    }
}
