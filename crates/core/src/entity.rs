//! Capability traits for encodable entities and the typed field reader their
//! `from_dict` implementations share.

use crate::codec::{self, Document, Value};
use crate::error::CoreError;
use crate::types::EntityTime;

// ---------------------------------------------------------------------------
// Encodable
// ---------------------------------------------------------------------------

/// An entity with a stable uid that converts to and from a [`Document`].
///
/// Implementations list every field explicitly in both directions.
pub trait Encodable: Sized {
    /// The caller-assigned identifier.
    fn uid(&self) -> &str;

    /// The entity's fields as domain values. Timestamps stay unwrapped.
    ///
    /// Fails with [`CoreError::Encoding`] when the entity holds a value that
    /// would not decode back to itself.
    fn to_dict(&self) -> Result<Document, CoreError>;

    /// Rebuild the entity from [`Encodable::to_dict`] output.
    fn from_dict(src: &Document) -> Result<Self, CoreError>;

    /// The entity as JSON, with timestamps wrapped.
    fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        codec::encode(&Value::Map(self.to_dict()?))
    }

    /// The entity as canonical JSON text.
    fn to_json_string(&self) -> Result<String, CoreError> {
        codec::to_canonical_string(&Value::Map(self.to_dict()?))
    }

    fn from_json(src: &serde_json::Value) -> Result<Self, CoreError> {
        let doc = into_document(codec::decode(src)?)?;
        Self::from_dict(&doc)
    }

    fn from_json_str(src: &str) -> Result<Self, CoreError> {
        let doc = into_document(codec::from_canonical_str(src)?)?;
        Self::from_dict(&doc)
    }
}

/// Unwrap a decoded value that must be a mapping.
pub fn into_document(value: Value) -> Result<Document, CoreError> {
    match value {
        Value::Map(doc) => Ok(doc),
        other => Err(CoreError::Decoding(format!(
            "expected a mapping, found {}",
            other.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Composite entities
// ---------------------------------------------------------------------------

/// One slot of a parent's child list: the child itself, or only its uid.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSlot<C> {
    Inline(C),
    Reference(String),
}

impl<C: Encodable> ChildSlot<C> {
    pub fn uid(&self) -> &str {
        match self {
            ChildSlot::Inline(child) => child.uid(),
            ChildSlot::Reference(uid) => uid,
        }
    }

    pub fn as_inline(&self) -> Option<&C> {
        match self {
            ChildSlot::Inline(child) => Some(child),
            ChildSlot::Reference(_) => None,
        }
    }
}

impl<C> From<C> for ChildSlot<C> {
    fn from(child: C) -> Self {
        ChildSlot::Inline(child)
    }
}

/// An entity that owns an ordered list of children.
pub trait Composite: Encodable {
    type Child: Encodable + Clone;

    fn children(&self) -> &[ChildSlot<Self::Child>];

    /// Encode the entity. With `replace_children_with_uid`, every child slot
    /// becomes its uid string; otherwise inline children stay full mappings.
    fn to_dict_replacing(&self, replace_children_with_uid: bool) -> Result<Document, CoreError>;

    /// Rebuild the entity. Uid slots are resolved against `available` when
    /// given and kept as references otherwise; mapping slots are rebuilt
    /// directly and `available` is ignored.
    fn from_dict_resolving(
        src: &Document,
        available: Option<&[Self::Child]>,
    ) -> Result<Self, CoreError>;
}

/// Encode a child list as either uid strings or inline mappings.
///
/// Without `replace_with_uid`, inline and reference slots may not be mixed:
/// the resulting list could not be decoded.
pub fn encode_children<C: Encodable>(
    slots: &[ChildSlot<C>],
    replace_with_uid: bool,
) -> Result<Value, CoreError> {
    if !replace_with_uid {
        let inline = slots.iter().filter(|s| s.as_inline().is_some()).count();
        if inline != 0 && inline != slots.len() {
            return Err(CoreError::Encoding(
                "cannot encode a mix of inline and reference children inline; replace them with uids"
                    .into(),
            ));
        }
    }

    let encoded = slots
        .iter()
        .map(|slot| match slot {
            ChildSlot::Inline(child) if !replace_with_uid => Ok(Value::Map(child.to_dict()?)),
            _ => Ok(Value::Str(slot.uid().to_string())),
        })
        .collect::<Result<_, CoreError>>()?;
    Ok(Value::List(encoded))
}

/// Decode a child list. All slots must be uid strings or all mappings.
pub fn decode_children<C: Encodable + Clone>(
    slots: &[Value],
    available: Option<&[C]>,
) -> Result<Vec<ChildSlot<C>>, CoreError> {
    let all_refs = slots.iter().all(|s| matches!(s, Value::Str(_)));
    let all_inline = slots.iter().all(|s| matches!(s, Value::Map(_)));
    if !all_refs && !all_inline {
        return Err(CoreError::Decoding(
            "child slots must be all uid strings or all mappings".into(),
        ));
    }

    slots
        .iter()
        .map(|slot| match slot {
            Value::Map(doc) => C::from_dict(doc).map(ChildSlot::Inline),
            Value::Str(uid) => match available {
                Some(pool) => pool
                    .iter()
                    .find(|c| c.uid() == uid)
                    .cloned()
                    .map(ChildSlot::Inline)
                    .ok_or_else(|| CoreError::Lookup { uid: uid.clone() }),
                None => Ok(ChildSlot::Reference(uid.clone())),
            },
            other => Err(CoreError::Decoding(format!(
                "child slot must be a uid or a mapping, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Typed access to the fields of a [`Document`] during decoding.
///
/// Missing or mistyped fields are reported as [`CoreError::Decoding`] naming
/// the entity and field.
pub struct Fields<'a> {
    entity: &'static str,
    doc: &'a Document,
}

impl<'a> Fields<'a> {
    pub fn new(entity: &'static str, doc: &'a Document) -> Self {
        Self { entity, doc }
    }

    fn get(&self, name: &str) -> Result<&'a Value, CoreError> {
        self.doc.get(name).ok_or_else(|| {
            CoreError::Decoding(format!("{}: missing field {name:?}", self.entity))
        })
    }

    fn mistyped(&self, name: &str, expected: &str, found: &Value) -> CoreError {
        CoreError::Decoding(format!(
            "{}: field {name:?} should be {expected}, found {}",
            self.entity,
            found.type_name()
        ))
    }

    pub fn str(&self, name: &str) -> Result<String, CoreError> {
        match self.get(name)? {
            Value::Str(s) => Ok(s.clone()),
            other => Err(self.mistyped(name, "a string", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, CoreError> {
        match self.get(name)? {
            Value::Int(n) => Ok(*n),
            other => Err(self.mistyped(name, "an integer", other)),
        }
    }

    pub fn timestamp(&self, name: &str) -> Result<EntityTime, CoreError> {
        match self.get(name)? {
            Value::Timestamp(t) => Ok(*t),
            other => Err(self.mistyped(name, "a timestamp", other)),
        }
    }

    pub fn list(&self, name: &str) -> Result<&'a [Value], CoreError> {
        match self.get(name)? {
            Value::List(items) => Ok(items),
            other => Err(self.mistyped(name, "a list", other)),
        }
    }

    pub fn map(&self, name: &str) -> Result<&'a Document, CoreError> {
        match self.get(name)? {
            Value::Map(doc) => Ok(doc),
            other => Err(self.mistyped(name, "a mapping", other)),
        }
    }
}
