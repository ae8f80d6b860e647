//! Trailer Record
//!
//! The trailer names the document root and describes the cross-reference
//! section that was just read: `/Root`, `/Size`, optional `/Prev` for the
//! incremental-update chain, optional `/Info`.

use super::{ParseError, ParseResult};
use crate::objects::{ObjectId, PdfDictionary};

/// The typed trailer record carried by a [`Document`](crate::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trailer {
    /// Reference to the document catalog
    pub root: Option<ObjectId>,
    /// Reference to the information dictionary
    pub info: Option<ObjectId>,
    /// Declared table size (highest object number + 1)
    pub size: Option<i64>,
    /// Byte offset of the previous cross-reference section
    pub prev: Option<u64>,
}

fn reference_entry(dict: &PdfDictionary, key: &str) -> Option<ObjectId> {
    dict.get(key).and_then(|obj| obj.as_reference())
}

impl Trailer {
    /// Extract the typed record from a trailer dictionary.
    pub fn from_dict(dict: &PdfDictionary) -> Self {
        Self {
            root: reference_entry(dict, "Root"),
            info: reference_entry(dict, "Info"),
            size: dict.get("Size").and_then(|obj| obj.as_integer()),
            prev: dict
                .get("Prev")
                .and_then(|obj| obj.as_integer())
                .filter(|v| *v >= 0)
                .map(|v| v as u64),
        }
    }

    /// A loadable document must name its root.
    pub fn validate(&self) -> ParseResult<()> {
        if self.root.is_none() {
            return Err(ParseError::MissingKey("Root".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfObject;

    #[test]
    fn test_from_dict() {
        let mut dict = PdfDictionary::new();
        dict.insert("Size", PdfObject::Integer(8));
        dict.insert("Root", PdfObject::Reference(ObjectId::new(1, 0)));
        dict.insert("Info", PdfObject::Reference(ObjectId::new(7, 0)));
        dict.insert("Prev", PdfObject::Integer(5000));

        let trailer = Trailer::from_dict(&dict);
        assert_eq!(trailer.root, Some(ObjectId::new(1, 0)));
        assert_eq!(trailer.info, Some(ObjectId::new(7, 0)));
        assert_eq!(trailer.size, Some(8));
        assert_eq!(trailer.prev, Some(5000));
        assert!(trailer.validate().is_ok());
    }

    #[test]
    fn test_missing_root_fails_validation() {
        let mut dict = PdfDictionary::new();
        dict.insert("Size", PdfObject::Integer(3));
        let trailer = Trailer::from_dict(&dict);
        assert!(matches!(trailer.validate(), Err(ParseError::MissingKey(_))));
    }

    #[test]
    fn test_non_reference_root_ignored() {
        let mut dict = PdfDictionary::new();
        dict.insert("Root", PdfObject::Integer(1));
        assert_eq!(Trailer::from_dict(&dict).root, None);
    }
}
