//! Parent record: a name plus an ordered list of owned children.
//!
//! Stored payloads always carry children in reference form; the children
//! themselves live in their own rows and are reattached on read.

use validator::Validate;

use crate::codec::{Document, Value};
use crate::entity::{decode_children, encode_children, ChildSlot, Composite, Encodable, Fields};
use crate::error::CoreError;
use crate::kind::{EntityKind, RootEntity, Storable};
use crate::models::child::ChildRecord;
use crate::validation::validate_entity;

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ParentRecord {
    #[validate(length(min = 1, max = 64))]
    pub uid: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub children: Vec<ChildSlot<ChildRecord>>,
}

impl ParentRecord {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        children: impl IntoIterator<Item = ChildRecord>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            children: children.into_iter().map(ChildSlot::Inline).collect(),
        }
    }
}

impl Encodable for ParentRecord {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn to_dict(&self) -> Result<Document, CoreError> {
        self.to_dict_replacing(false)
    }

    fn from_dict(src: &Document) -> Result<Self, CoreError> {
        Self::from_dict_resolving(src, None)
    }
}

impl Composite for ParentRecord {
    type Child = ChildRecord;

    fn children(&self) -> &[ChildSlot<ChildRecord>] {
        &self.children
    }

    fn to_dict_replacing(&self, replace_children_with_uid: bool) -> Result<Document, CoreError> {
        let mut doc = Document::new();
        doc.insert("uid".into(), Value::from(self.uid.as_str()));
        doc.insert("name".into(), Value::from(self.name.as_str()));
        doc.insert(
            "children".into(),
            encode_children(&self.children, replace_children_with_uid)?,
        );
        Ok(doc)
    }

    fn from_dict_resolving(
        src: &Document,
        available: Option<&[ChildRecord]>,
    ) -> Result<Self, CoreError> {
        let fields = Fields::new("ParentRecord", src);
        Ok(Self {
            uid: fields.str("uid")?,
            name: fields.str("name")?,
            children: decode_children(fields.list("children")?, available)?,
        })
    }
}

impl Storable for ParentRecord {
    const KIND: EntityKind = EntityKind::Parent;

    fn stored_dict(&self) -> Result<Document, CoreError> {
        self.to_dict_replacing(true)
    }

    fn owned_children(&self) -> Result<Vec<(String, Document)>, CoreError> {
        self.children
            .iter()
            .map(|slot| match slot {
                ChildSlot::Inline(child) => {
                    validate_entity(child, "child")?;
                    Ok((child.uid.clone(), child.to_dict()?))
                }
                ChildSlot::Reference(uid) => Err(CoreError::Integrity(format!(
                    "parent {} holds child {uid} by reference only; children must be inline to be stored",
                    self.uid
                ))),
            })
            .collect()
    }

    fn restore(src: &Document, children: &[Document]) -> Result<Self, CoreError> {
        let pool = children
            .iter()
            .map(ChildRecord::from_dict)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_dict_resolving(src, Some(pool.as_slice()))
    }
}

impl RootEntity for ParentRecord {}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::types::EntityTime;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> EntityTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn fixture() -> (ParentRecord, ChildRecord, ChildRecord) {
        let first = ChildRecord::new("child01", at(2019, 1, 2, 3, 4, 5));
        let second = ChildRecord::new("child02", at(2020, 6, 7, 8, 9, 0));
        let parent = ParentRecord::new("parent01", "parent", [first.clone(), second.clone()]);
        (parent, first, second)
    }

    #[test]
    fn inline_dict_round_trip() {
        let (parent, first, _) = fixture();
        let as_dict = parent.to_dict().unwrap();
        let Value::List(slots) = &as_dict["children"] else {
            panic!("children should be a list");
        };
        assert_eq!(slots[0], Value::Map(first.to_dict().unwrap()));
        assert_eq!(ParentRecord::from_dict(&as_dict).unwrap(), parent);
    }

    #[test]
    fn inline_json_text() {
        let (parent, _, _) = fixture();
        let text = parent.to_json_string().unwrap();
        assert_eq!(
            text,
            concat!(
                r#"{"children":[{"uid":"child01","when":{"_timestamp_":"2019-01-02T03:04:05"}},"#,
                r#"{"uid":"child02","when":{"_timestamp_":"2020-06-07T08:09:00"}}],"#,
                r#""name":"parent","uid":"parent01"}"#
            )
        );
        assert_eq!(ParentRecord::from_json_str(&text).unwrap(), parent);
    }

    #[test]
    fn reference_form_resolves_against_pool() {
        let (parent, first, second) = fixture();
        let as_dict = parent.to_dict_replacing(true).unwrap();
        assert_eq!(
            as_dict["children"],
            Value::List(vec![Value::from("child01"), Value::from("child02")])
        );

        let pool = [second, first];
        let restored = ParentRecord::from_dict_resolving(&as_dict, Some(&pool[..])).unwrap();
        assert_eq!(restored, parent);
    }

    #[test]
    fn reference_form_without_pool_keeps_references() {
        let (parent, _, _) = fixture();
        let restored = ParentRecord::from_dict(&parent.to_dict_replacing(true).unwrap()).unwrap();
        assert_eq!(
            restored.children,
            vec![
                ChildSlot::Reference("child01".into()),
                ChildSlot::Reference("child02".into())
            ]
        );
    }

    #[test]
    fn missing_child_in_pool_is_a_lookup_error() {
        let (parent, first, _) = fixture();
        let pool = [first];
        let as_dict = parent.to_dict_replacing(true).unwrap();
        let err = ParentRecord::from_dict_resolving(&as_dict, Some(&pool[..])).unwrap_err();
        assert_matches!(err, CoreError::Lookup { uid } if uid == "child02");
    }

    #[test]
    fn inline_slots_ignore_the_pool() {
        let (parent, _, _) = fixture();
        let as_dict = parent.to_dict().unwrap();
        let restored = ParentRecord::from_dict_resolving(&as_dict, Some(&[][..])).unwrap();
        assert_eq!(restored, parent);
    }

    #[test]
    fn mixed_slots_are_rejected() {
        let (parent, first, _) = fixture();
        let mut doc = parent.to_dict().unwrap();
        doc.insert(
            "children".into(),
            Value::List(vec![Value::Map(first.to_dict().unwrap()), Value::from("child02")]),
        );
        assert_matches!(ParentRecord::from_dict(&doc), Err(CoreError::Decoding(_)));
    }

    #[test]
    fn stored_payload_uses_references_and_children_get_rows() {
        let (parent, first, second) = fixture();
        let stored = parent.stored_dict().unwrap();
        assert_eq!(stored, parent.to_dict_replacing(true).unwrap());

        let rows = parent.owned_children().unwrap();
        assert_eq!(
            rows,
            vec![
                ("child01".to_string(), first.to_dict().unwrap()),
                ("child02".to_string(), second.to_dict().unwrap())
            ]
        );

        let child_docs: Vec<_> = rows.into_iter().map(|(_, doc)| doc).collect();
        assert_eq!(ParentRecord::restore(&stored, &child_docs).unwrap(), parent);
    }

    #[test]
    fn reference_only_children_cannot_be_stored() {
        let mut parent = fixture().0;
        parent.children[1] = ChildSlot::Reference("child02".into());
        assert_matches!(parent.owned_children(), Err(CoreError::Integrity(_)));
    }

    #[test]
    fn mixed_slots_cannot_be_encoded_inline() {
        let (mut parent, _, _) = fixture();
        parent.children[1] = ChildSlot::Reference("child02".into());

        assert_matches!(parent.to_dict(), Err(CoreError::Encoding(_)));
        assert_matches!(parent.to_json_string(), Err(CoreError::Encoding(_)));

        let as_refs = parent.to_dict_replacing(true).unwrap();
        assert_eq!(
            as_refs["children"],
            Value::List(vec![Value::from("child01"), Value::from("child02")])
        );
    }

    #[test]
    fn reference_only_parent_round_trips() {
        let mut parent = fixture().0;
        parent.children = vec![
            ChildSlot::Reference("child01".into()),
            ChildSlot::Reference("child02".into()),
        ];
        let as_dict = parent.to_dict().unwrap();
        assert_eq!(ParentRecord::from_dict(&as_dict).unwrap(), parent);
    }
}
