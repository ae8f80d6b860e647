//! PDF Object Model
//!
//! One tagged representation for every object kind defined by
//! ISO 32000-1 Section 7.3. The same graph is produced by the parser and
//! consumed by the writer; indirect references are plain `(number, generation)`
//! indices into a [`Document`](crate::Document) arena, never owning pointers.

use std::collections::HashMap;
use std::fmt;

/// Identifier of an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    number: u32,
    generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object (e.g., /Type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfName(pub String);

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// PDF String object. Always a byte string; PDF strings are not required to
/// be valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        PdfString(data.into())
    }

    /// Get as UTF-8 text if possible
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

impl PdfArray {
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

impl From<Vec<PdfObject>> for PdfArray {
    fn from(v: Vec<PdfObject>) -> Self {
        PdfArray(v)
    }
}

/// PDF Dictionary object. Key order is irrelevant to the data model; the
/// writer sorts keys when serializing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

impl PdfDictionary {
    pub fn new() -> Self {
        PdfDictionary(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(&PdfName(key.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(&PdfName(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&PdfName(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    /// Get the dictionary type (value of the /Type key)
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|obj| obj.as_name()).map(|n| n.as_str())
    }
}

/// PDF Stream object: a dictionary plus a raw payload.
///
/// `data` always holds the payload exactly as it sits in the file (still
/// filter-encoded); the declared `/Length` matches `data.len()`. Decoding
/// happens on demand through [`decoded`](PdfStream::decoded).
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Create a stream over raw (already encoded, or unfiltered) bytes,
    /// recording the correct `/Length`.
    pub fn new(mut dict: PdfDictionary, data: Vec<u8>) -> Self {
        dict.insert("Length", PdfObject::Integer(data.len() as i64));
        Self { dict, data }
    }

    /// Create a stream by pushing logical bytes through an encode chain,
    /// recording `/Filter` and the encoded `/Length`.
    pub fn with_filters(
        mut dict: PdfDictionary,
        data: &[u8],
        filters: &[crate::filters::Filter],
    ) -> Result<Self, crate::filters::FilterError> {
        let encoded = crate::filters::encode_chain(data, filters)?;
        match filters {
            [] => {}
            [single] => dict.insert("Filter", PdfObject::Name(PdfName::new(single.name()))),
            many => dict.insert(
                "Filter",
                PdfObject::Array(PdfArray(
                    many.iter()
                        .map(|f| PdfObject::Name(PdfName::new(f.name())))
                        .collect(),
                )),
            ),
        }
        Ok(Self::new(dict, encoded))
    }

    /// The logical payload: raw bytes pushed through the declared filter
    /// chain in declared order.
    pub fn decoded(&self) -> Result<Vec<u8>, crate::filters::FilterError> {
        crate::filters::decode_stream(&self.data, &self.dict, false)
    }

    /// The raw (possibly encoded) payload.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object kinds, ISO 32000-1 Section 7.3
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

impl PdfObject {
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as a real number; integers coerce.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as dictionary; streams expose their dictionary too.
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Collect every indirect reference contained in this object, including
    /// those nested inside arrays, dictionaries and stream dictionaries.
    pub fn collect_references(&self, out: &mut Vec<ObjectId>) {
        match self {
            PdfObject::Reference(id) => out.push(*id),
            PdfObject::Array(arr) => {
                for item in arr.iter() {
                    item.collect_references(out);
                }
            }
            PdfObject::Dictionary(dict) => {
                for (_, value) in dict.iter() {
                    value.collect_references(out);
                }
            }
            PdfObject::Stream(stream) => {
                for (_, value) in stream.dict.iter() {
                    value.collect_references(out);
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for PdfObject {
    fn from(b: bool) -> Self {
        PdfObject::Boolean(b)
    }
}

impl From<i64> for PdfObject {
    fn from(i: i64) -> Self {
        PdfObject::Integer(i)
    }
}

impl From<i32> for PdfObject {
    fn from(i: i32) -> Self {
        PdfObject::Integer(i as i64)
    }
}

impl From<f64> for PdfObject {
    fn from(f: f64) -> Self {
        PdfObject::Real(f)
    }
}

impl From<ObjectId> for PdfObject {
    fn from(id: ObjectId) -> Self {
        PdfObject::Reference(id)
    }
}

impl From<PdfArray> for PdfObject {
    fn from(a: PdfArray) -> Self {
        PdfObject::Array(a)
    }
}

impl From<PdfDictionary> for PdfObject {
    fn from(d: PdfDictionary) -> Self {
        PdfObject::Dictionary(d)
    }
}
