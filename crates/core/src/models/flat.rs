//! Flat record: scalar fields only, no owned children.

use validator::Validate;

use crate::codec::{Document, Value};
use crate::entity::{Encodable, Fields};
use crate::error::CoreError;
use crate::kind::{EntityKind, RootEntity, Storable};

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct FlatRecord {
    #[validate(length(min = 1, max = 64))]
    pub uid: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub count: i64,
}

impl FlatRecord {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, count: i64) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            count,
        }
    }
}

impl Encodable for FlatRecord {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn to_dict(&self) -> Result<Document, CoreError> {
        let mut doc = Document::new();
        doc.insert("uid".into(), Value::from(self.uid.as_str()));
        doc.insert("name".into(), Value::from(self.name.as_str()));
        doc.insert("count".into(), Value::Int(self.count));
        Ok(doc)
    }

    fn from_dict(src: &Document) -> Result<Self, CoreError> {
        let fields = Fields::new("FlatRecord", src);
        Ok(Self {
            uid: fields.str("uid")?,
            name: fields.str("name")?,
            count: fields.int("count")?,
        })
    }
}

impl Storable for FlatRecord {
    const KIND: EntityKind = EntityKind::Flat;
}

impl RootEntity for FlatRecord {}
