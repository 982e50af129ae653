//! Server-rendered view glue for the merge selection page.
//!
//! The merge page shows the master and the duplicate side by side with a
//! radio input per attribute; whichever side is selected keeps its value.
//! These helpers emit the HTML fragments for that page and flatten
//! custom-field metadata for display.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::merge::MergeSource;

/// Minimal HTML escaping for text and attribute values.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// An anchor that opens in a new browsing context.
pub fn link_to_new_window(text: &str, href: &str) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\">{}</a>",
        escape_html(href),
        escape_html(text)
    )
}

/// A radio button for choosing whether to ignore the duplicate's value for
/// one attribute. `value` is "yes" (keep master) or "no" (take duplicate);
/// the default precedence decides which side starts out checked.
pub fn ignore_merge_radio_button(value: &str, attribute: &str, merge_case: MergeSource) -> String {
    let checked = match merge_case {
        MergeSource::Master => value == "yes",
        MergeSource::Duplicate => value == "no",
    };
    format!(
        "<input type=\"radio\" name=\"ignore[_self][{attribute}]\" \
         id=\"ignore_self_{attribute}_{value}\" value=\"{value}\"{} />",
        if checked { " checked=\"checked\"" } else { "" }
    )
}

/// Flatten a record's custom-field metadata JSON into an ordered
/// name → display-value map for the side-by-side comparison table.
pub fn custom_field_merge_attributes(metadata: Option<&str>) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let Some(raw) = metadata else {
        return fields;
    };
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        return fields;
    };
    for (name, value) in map {
        let display = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(true) => "yes".to_string(),
            Value::Bool(false) => "no".to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        fields.insert(name, display);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_to_new_window() {
        let html = link_to_new_window("Acme <Corp>", "https://example.com/?a=1&b=2");
        assert_eq!(
            html,
            "<a href=\"https://example.com/?a=1&amp;b=2\" target=\"_blank\">Acme &lt;Corp&gt;</a>"
        );
    }

    #[test]
    fn test_radio_button_master_default_checks_yes() {
        let yes = ignore_merge_radio_button("yes", "phone", MergeSource::Master);
        let no = ignore_merge_radio_button("no", "phone", MergeSource::Master);
        assert!(yes.contains("checked=\"checked\""));
        assert!(!no.contains("checked"));
        assert!(yes.contains("name=\"ignore[_self][phone]\""));
        assert!(yes.contains("id=\"ignore_self_phone_yes\""));
    }

    #[test]
    fn test_radio_button_duplicate_default_checks_no() {
        let yes = ignore_merge_radio_button("yes", "category", MergeSource::Duplicate);
        let no = ignore_merge_radio_button("no", "category", MergeSource::Duplicate);
        assert!(!yes.contains("checked"));
        assert!(no.contains("checked=\"checked\""));
    }

    #[test]
    fn test_custom_field_merge_attributes() {
        let metadata = r#"{"region": "EMEA", "seats": 40, "pilot": true, "notes": null}"#;
        let fields = custom_field_merge_attributes(Some(metadata));
        assert_eq!(fields["region"], "EMEA");
        assert_eq!(fields["seats"], "40");
        assert_eq!(fields["pilot"], "yes");
        assert_eq!(fields["notes"], "");
    }

    #[test]
    fn test_custom_field_merge_attributes_tolerates_missing_or_bad_json() {
        assert!(custom_field_merge_attributes(None).is_empty());
        assert!(custom_field_merge_attributes(Some("not json")).is_empty());
    }
}
