//! Experiment: a name plus polymorphic details.
//!
//! Tagged details carry their variant in a `_json_cls` field. Decoding goes
//! through the closed [`DetailsKind`] set, so an unrecognised tag is a
//! decoding error rather than a lookup of some arbitrary type.

use validator::{Validate, ValidationError};

use crate::codec::{Document, Value};
use crate::entity::{Encodable, Fields};
use crate::error::CoreError;
use crate::kind::{EntityKind, RootEntity, Storable};

/// Field carrying the details variant tag.
pub const CLASS_KEY: &str = "_json_cls";

/// Tagged details variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsKind {
    Text,
    Number,
}

impl DetailsKind {
    pub fn tag(self) -> &'static str {
        match self {
            DetailsKind::Text => "DetailsTxt",
            DetailsKind::Number => "DetailsNum",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, CoreError> {
        match tag {
            "DetailsTxt" => Ok(DetailsKind::Text),
            "DetailsNum" => Ok(DetailsKind::Number),
            other => Err(CoreError::Decoding(format!("unknown details tag {other:?}"))),
        }
    }
}

/// What an experiment recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Details {
    Text { text: String },
    Number { number: i64 },
    /// Untagged free-form mapping.
    Dictionary(Document),
}

impl Details {
    pub fn kind(&self) -> Option<DetailsKind> {
        match self {
            Details::Text { .. } => Some(DetailsKind::Text),
            Details::Number { .. } => Some(DetailsKind::Number),
            Details::Dictionary(_) => None,
        }
    }

    /// Encode the details. A dictionary using the tag key is refused, since
    /// it would decode as a tagged variant.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        let mut doc = match self {
            Details::Text { text } => Document::from([("text".to_string(), Value::from(text.as_str()))]),
            Details::Number { number } => Document::from([("number".to_string(), Value::Int(*number))]),
            Details::Dictionary(doc) if doc.contains_key(CLASS_KEY) => {
                return Err(CoreError::Encoding(format!(
                    "details key {CLASS_KEY:?} is reserved for the variant tag"
                )))
            }
            Details::Dictionary(doc) => return Ok(Value::Map(doc.clone())),
        };
        if let Some(kind) = self.kind() {
            doc.insert(CLASS_KEY.into(), Value::from(kind.tag()));
        }
        Ok(Value::Map(doc))
    }

    pub fn from_document(doc: &Document) -> Result<Self, CoreError> {
        let Some(tag) = doc.get(CLASS_KEY) else {
            return Ok(Details::Dictionary(doc.clone()));
        };
        let Value::Str(tag) = tag else {
            return Err(CoreError::Decoding(format!(
                "details tag should be a string, found {}",
                tag.type_name()
            )));
        };
        let kind = DetailsKind::from_tag(tag)?;
        if doc.len() != 2 {
            return Err(CoreError::Decoding(format!(
                "{} details expect exactly one field, found {}",
                kind.tag(),
                doc.len() - 1
            )));
        }

        let fields = Fields::new(kind.tag(), doc);
        Ok(match kind {
            DetailsKind::Text => Details::Text {
                text: fields.str("text")?,
            },
            DetailsKind::Number => Details::Number {
                number: fields.int("number")?,
            },
        })
    }
}

fn validate_details(experiment: &Experiment) -> Result<(), ValidationError> {
    match &experiment.details {
        Details::Dictionary(doc) if doc.contains_key(CLASS_KEY) => {
            Err(ValidationError::new("reserved_details_key"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Validate)]
#[validate(schema(function = "validate_details"))]
pub struct Experiment {
    #[validate(length(min = 1, max = 64))]
    pub uid: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub details: Details,
}

impl Experiment {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, details: Details) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            details,
        }
    }
}

impl Encodable for Experiment {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn to_dict(&self) -> Result<Document, CoreError> {
        let mut doc = Document::new();
        doc.insert("uid".into(), Value::from(self.uid.as_str()));
        doc.insert("name".into(), Value::from(self.name.as_str()));
        doc.insert("details".into(), self.details.to_value()?);
        Ok(doc)
    }

    fn from_dict(src: &Document) -> Result<Self, CoreError> {
        let fields = Fields::new("Experiment", src);
        Ok(Self {
            uid: fields.str("uid")?,
            name: fields.str("name")?,
            details: Details::from_document(fields.map("details")?)?,
        })
    }
}

impl Storable for Experiment {
    const KIND: EntityKind = EntityKind::Experiment;
}

impl RootEntity for Experiment {}
