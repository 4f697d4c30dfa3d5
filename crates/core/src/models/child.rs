//! Child record: owned by exactly one parent, carries a timestamp.

use validator::Validate;

use crate::codec::{Document, Value};
use crate::entity::{Encodable, Fields};
use crate::error::CoreError;
use crate::kind::{EntityKind, Storable};
use crate::types::EntityTime;

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ChildRecord {
    #[validate(length(min = 1, max = 64))]
    pub uid: String,
    pub when: EntityTime,
}

impl ChildRecord {
    pub fn new(uid: impl Into<String>, when: EntityTime) -> Self {
        Self {
            uid: uid.into(),
            when,
        }
    }
}

impl Encodable for ChildRecord {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn to_dict(&self) -> Result<Document, CoreError> {
        let mut doc = Document::new();
        doc.insert("uid".into(), Value::from(self.uid.as_str()));
        doc.insert("when".into(), Value::Timestamp(self.when));
        Ok(doc)
    }

    fn from_dict(src: &Document) -> Result<Self, CoreError> {
        let fields = Fields::new("ChildRecord", src);
        Ok(Self {
            uid: fields.str("uid")?,
            when: fields.timestamp("when")?,
        })
    }
}

impl Storable for ChildRecord {
    const KIND: EntityKind = EntityKind::Child;
}
