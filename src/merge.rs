//! Attribute precedence resolution for duplicate-record merges.
//!
//! A merge consolidates a duplicate record into a master record. Which side
//! supplies each attribute is decided up front: the master keeps every
//! attribute it already has a value for, the duplicate fills the blanks, and
//! caller-supplied ignored attributes never copy at all. The resolver works
//! on `serde_json` attribute maps so the same code serves accounts and
//! contacts.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};

/// Attributes that are never copied between accounts, no matter what the
/// caller asks for. Tags and custom-field metadata have their own merge
/// steps; identifiers and timestamps belong to the surviving row.
pub const ACCOUNT_IGNORED_ATTRIBUTES: &[&str] =
    &["id", "created_at", "updated_at", "tags", "metadata"];

/// Permanently ignored contact attributes.
pub const CONTACT_IGNORED_ATTRIBUTES: &[&str] =
    &["id", "created_at", "updated_at", "tags", "metadata"];

/// Which record supplies the value for a given attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSource {
    Master,
    Duplicate,
}

/// Blank means null or an empty/whitespace-only string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Collapse the permanent ignore list and the caller-supplied list into a
/// single exclusion set, computed once per merge.
pub fn resolve_exclusions(permanent: &[&str], extra: &[&str]) -> HashSet<String> {
    permanent
        .iter()
        .chain(extra.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Serialize a record into its attribute map.
pub fn attribute_map<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Decide the value source for every attribute under consideration.
///
/// For each attribute not in the exclusion set: master wins when its value
/// is non-blank, the duplicate wins when only it has a value, and the
/// attribute is omitted when both sides are blank.
pub fn default_precedence(
    duplicate: &Map<String, Value>,
    master: &Map<String, Value>,
    excluded: &HashSet<String>,
) -> BTreeMap<String, MergeSource> {
    let mut precedence = BTreeMap::new();
    for (attribute, dup_value) in duplicate {
        if excluded.contains(attribute) {
            continue;
        }
        let master_value = master.get(attribute).unwrap_or(&Value::Null);
        if !is_blank(master_value) {
            precedence.insert(attribute.clone(), MergeSource::Master);
        } else if !is_blank(dup_value) {
            precedence.insert(attribute.clone(), MergeSource::Duplicate);
        }
    }
    precedence
}

/// Apply a precedence map: start from the master's attributes and copy in
/// the duplicate's value for every attribute the duplicate won.
pub fn merged_attribute_values(
    master: &Map<String, Value>,
    duplicate: &Map<String, Value>,
    precedence: &BTreeMap<String, MergeSource>,
) -> Map<String, Value> {
    let mut merged = master.clone();
    for (attribute, source) in precedence {
        if *source == MergeSource::Duplicate {
            if let Some(value) = duplicate.get(attribute) {
                merged.insert(attribute.clone(), value.clone());
            }
        }
    }
    merged
}

/// Union two tag lists, keeping the master's order and appending the
/// duplicate's unseen tags in their original order.
pub fn union_tags(master: &[String], duplicate: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = master.to_vec();
    for tag in duplicate {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("   ")));
        assert!(!is_blank(&json!("Gold")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }

    #[test]
    fn test_default_precedence_master_wins_when_present() {
        let master = obj(json!({"background_info": "Master Info", "category": null}));
        let duplicate = obj(json!({"background_info": "Dup Info", "category": "Gold"}));
        let precedence = default_precedence(&duplicate, &master, &HashSet::new());
        assert_eq!(precedence["background_info"], MergeSource::Master);
        assert_eq!(precedence["category"], MergeSource::Duplicate);
    }

    #[test]
    fn test_default_precedence_omits_attribute_when_both_blank() {
        let master = obj(json!({"fax": "", "phone": null}));
        let duplicate = obj(json!({"fax": null, "phone": "  "}));
        let precedence = default_precedence(&duplicate, &master, &HashSet::new());
        assert!(precedence.is_empty());
    }

    #[test]
    fn test_default_precedence_skips_excluded() {
        let master = obj(json!({"name": null}));
        let duplicate = obj(json!({"name": "Dup"}));
        let excluded = resolve_exclusions(&[], &["name"]);
        let precedence = default_precedence(&duplicate, &master, &excluded);
        assert!(precedence.is_empty());
    }

    #[test]
    fn test_merged_attribute_values_copies_duplicate_wins_only() {
        let master = obj(json!({"name": "Master", "category": null}));
        let duplicate = obj(json!({"name": "Dup", "category": "Gold"}));
        let precedence = default_precedence(&duplicate, &master, &HashSet::new());
        let merged = merged_attribute_values(&master, &duplicate, &precedence);
        assert_eq!(merged["name"], json!("Master"));
        assert_eq!(merged["category"], json!("Gold"));
    }

    #[test]
    fn test_resolve_exclusions_unions_both_lists() {
        let excluded = resolve_exclusions(ACCOUNT_IGNORED_ATTRIBUTES, &["phone"]);
        assert!(excluded.contains("id"));
        assert!(excluded.contains("tags"));
        assert!(excluded.contains("phone"));
        assert!(!excluded.contains("category"));
    }

    #[test]
    fn test_union_tags_keeps_order_and_dedupes() {
        let master = vec!["tag1".into(), "tag2".into(), "tag3".into()];
        let duplicate = vec!["tag3".into(), "tag4".into()];
        assert_eq!(union_tags(&master, &duplicate), vec!["tag1", "tag2", "tag3", "tag4"]);
    }
}
