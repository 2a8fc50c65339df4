//! `.partner` text format: parse and serialize.
//!
//! One field per line, `key__:value;`. Lines starting with `#` are comments.
//! Keys prefixed with `auth.` target the partner's user account, keys
//! prefixed with `cf.` target custom fields, all others the profile.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::schema::Schema;
use super::types::{
    LiveRecord, ParseError, ParseErrorKind, ParseResult, ParseWarning, ParsedField, Section,
    WarningKind, value_text,
};

/// Separator between key and value.
pub const SEPARATOR: &str = "__:";

/// Line terminator.
pub const TERMINATOR: char = ';';

/// Version tag written in the header of serialized files.
pub const FORMAT_VERSION: &str = "partner/1";

/// Parse `.partner` text against the built-in schema.
#[must_use]
pub fn parse(text: &str) -> ParseResult {
    parse_with_schema(text, Schema::standard())
}

/// Parse `.partner` text.
///
/// Never fails as a whole: malformed lines are collected in `errors`,
/// unknown and duplicate keys in `warnings`, and parsing carries on.
#[must_use]
pub fn parse_with_schema(text: &str, schema: &Schema) -> ParseResult {
    let mut result = ParseResult::default();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (raw_key, value) = match split_line(trimmed) {
            Ok(pair) => pair,
            Err(kind) => {
                result.errors.push(ParseError {
                    line,
                    text: trimmed.to_string(),
                    kind,
                });
                continue;
            }
        };

        let (section, canonical_key) = Section::route(raw_key);
        let recognized = schema.is_known(section, canonical_key);
        if !recognized {
            result.warnings.push(ParseWarning {
                line,
                key: raw_key.to_string(),
                kind: WarningKind::UnknownKey,
            });
        }

        match first_seen.entry(raw_key) {
            Entry::Occupied(first) => result.warnings.push(ParseWarning {
                line,
                key: raw_key.to_string(),
                kind: WarningKind::DuplicateKey {
                    first_line: *first.get(),
                },
            }),
            Entry::Vacant(slot) => {
                slot.insert(line);
            }
        }

        result.fields.push(ParsedField {
            raw_key: raw_key.to_string(),
            canonical_key: canonical_key.to_string(),
            section,
            value: value.to_string(),
            recognized,
            display_label: schema
                .label(section, canonical_key)
                .unwrap_or(raw_key)
                .to_string(),
            line,
        });
    }

    result
}

/// Split a trimmed, non-comment line into key and trimmed value.
fn split_line(line: &str) -> Result<(&str, &str), ParseErrorKind> {
    let (key, rest) = line
        .split_once(SEPARATOR)
        .ok_or(ParseErrorKind::MissingSeparator)?;
    let value = rest
        .strip_suffix(TERMINATOR)
        .ok_or(ParseErrorKind::MissingTerminator)?;

    if !is_valid_key(key) {
        return Err(ParseErrorKind::InvalidKey);
    }

    Ok((key, value.trim()))
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Serialize a record to `.partner` text, stamped with the current time.
#[must_use]
pub fn serialize(record: &LiveRecord, schema: &Schema) -> String {
    serialize_at(record, schema, Utc::now())
}

/// Serialize a record to `.partner` text.
///
/// Emits the schema's profile fields, then `auth.*`, then `cf.*`, each in
/// schema order. Keys the schema does not know are backend-owned (`id`,
/// timestamps, nested collections) and are left out, as are null, empty
/// and non-scalar values. Values containing `;` or a line break cannot be
/// represented and are skipped with a warning.
#[must_use]
pub fn serialize_at(record: &LiveRecord, schema: &Schema, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Partner export\n");
    out.push_str(&format!("# format: {FORMAT_VERSION}\n"));
    out.push_str(&format!(
        "# generated: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push('\n');

    for section in Section::ALL {
        for (key, value) in schema_entries(record.section(section), schema, section) {
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                continue;
            }
            let Some(text) = value_text(value) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let raw_key = format!("{}{key}", section.prefix());
            if !is_valid_key(&raw_key) {
                warn!(key = %raw_key, "Skipping key the .partner format cannot express");
                continue;
            }
            if text.contains(TERMINATOR) || text.contains('\n') || text.contains('\r') {
                warn!(key = %raw_key, "Skipping value containing `;` or a line break");
                continue;
            }

            out.push_str(&format!("{raw_key}{SEPARATOR}{text}{TERMINATOR}\n"));
        }
    }

    out
}

/// Entries of `map` the schema knows for `section`, in schema order.
fn schema_entries<'a>(
    map: &'a Map<String, Value>,
    schema: &Schema,
    section: Section,
) -> Vec<(&'a str, &'a Value)> {
    schema
        .fields(section)
        .iter()
        .filter_map(|def| map.get_key_value(&def.key))
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partner::types::WarningKind;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn triples(result: &ParseResult) -> BTreeSet<(String, Section, String)> {
        result
            .fields
            .iter()
            .map(|f| (f.canonical_key.clone(), f.section, f.value.clone()))
            .collect()
    }

    #[test]
    fn test_parse_example_fragment() {
        let text = "name__:Supermarché Atlas;\n\
                    auth.email__:admin@atlas.ma;\n\
                    cf.partner_rib__:MA0123456789012345678;\n";
        let result = parse(text);

        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.fields.len(), 3);

        let name = &result.fields[0];
        assert_eq!(name.section, Section::Profile);
        assert_eq!(name.canonical_key, "name");
        assert_eq!(name.value, "Supermarché Atlas");
        assert_eq!(name.display_label, "Company name");
        assert_eq!(name.line, 1);

        let email = &result.fields[1];
        assert_eq!(email.raw_key, "auth.email");
        assert_eq!(email.canonical_key, "email");
        assert_eq!(email.section, Section::Auth);

        let rib = &result.fields[2];
        assert_eq!(rib.section, Section::Custom);
        assert_eq!(rib.canonical_key, "partner_rib");
        assert!(rib.recognized);
    }

    #[test]
    fn test_comments_and_blanks_only() {
        let text = "# header\n\n   \n   # indented comment\n\t\n";
        let result = parse(text);
        assert!(result.fields.is_empty());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_key_is_kept_with_warning() {
        let result = parse("foo__:bar;");
        assert_eq!(result.fields.len(), 1);
        let field = &result.fields[0];
        assert!(!field.recognized);
        assert_eq!(field.canonical_key, "foo");
        assert_eq!(field.display_label, "foo");
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, WarningKind::UnknownKey);
    }

    #[test]
    fn test_malformed_line_does_not_abort() {
        let text = "name__:Atlas;\ncity__:Casablanca\nphone__:0522000000;\n";
        let result = parse(text);

        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.fields[0].canonical_key, "name");
        assert_eq!(result.fields[1].canonical_key, "phone");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 2);
        assert_eq!(result.errors[0].text, "city__:Casablanca");
        assert_eq!(result.errors[0].kind, ParseErrorKind::MissingTerminator);
    }

    #[test]
    fn test_error_kinds() {
        let result = parse("just some text\nbad key__:x;\n__:x;\n");
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParseErrorKind::MissingSeparator,
                ParseErrorKind::InvalidKey,
                ParseErrorKind::InvalidKey,
            ]
        );
        assert!(result.fields.is_empty());
    }

    #[test]
    fn test_value_trimmed_and_may_be_empty() {
        let result = parse("  city__:  Rabat  ;   \nnotes__:;\n");
        assert!(result.errors.is_empty());
        assert_eq!(result.fields[0].value, "Rabat");
        assert_eq!(result.fields[1].value, "");
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let result = parse("city__:Rabat;\nname__:Atlas;\ncity__:Fes;\n");
        assert_eq!(result.fields.len(), 3);
        assert_eq!(result.fields[0].value, "Rabat");
        assert_eq!(result.fields[2].value, "Fes");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].line, 3);
        assert_eq!(
            result.warnings[0].kind,
            WarningKind::DuplicateKey { first_line: 1 }
        );
    }

    #[test]
    fn test_crlf_input() {
        let result = parse("name__:Atlas;\r\ncity__:Rabat;\r\n");
        assert!(result.errors.is_empty());
        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.fields[1].value, "Rabat");
    }

    #[test]
    fn test_serialize_order_and_header() {
        let record: LiveRecord = serde_json::from_value(json!({
            "city": "Casablanca",
            "name": "Atlas",
            "zzz_extra": "1",
            "notes": null,
            "website": "",
            "user": {"email": "admin@atlas.ma"},
            "custom_fields": {"partner_rib": "MA01"}
        }))
        .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

        let text = serialize_at(&record, Schema::standard(), at);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# Partner export");
        assert_eq!(lines[1], "# format: partner/1");
        assert_eq!(lines[2], "# generated: 2026-01-02T03:04:05Z");
        assert_eq!(
            &lines[4..],
            &[
                "name__:Atlas;",
                "city__:Casablanca;",
                "auth.email__:admin@atlas.ma;",
                "cf.partner_rib__:MA01;",
            ]
        );
    }

    #[test]
    fn test_serialize_skips_unrepresentable_values() {
        let record: LiveRecord = serde_json::from_value(json!({
            "name": "Atlas; SARL",
            "notes": "line one\nline two",
            "city": "Rabat"
        }))
        .unwrap();

        let text = serialize(&record, Schema::standard());
        let result = parse(&text);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields[0].canonical_key, "city");
    }

    #[test]
    fn test_round_trip_preserves_triples() {
        let record: LiveRecord = serde_json::from_value(json!({
            "name": "Supermarche Atlas",
            "city": "Casablanca",
            "credit_limit": 15000,
            "latitude": 33.57,
            "user": {"email": "admin@atlas.ma", "is_active": true},
            "custom_fields": {"partner_rib": "MA0123456789012345678", "delivery_window": "8-12"}
        }))
        .unwrap();

        let mut expected = BTreeSet::new();
        for section in Section::ALL {
            for (key, value) in record.section(section) {
                expected.insert((key.clone(), section, value_text(value).unwrap()));
            }
        }

        let result = parse(&serialize(&record, Schema::standard()));
        assert!(result.errors.is_empty());
        assert_eq!(triples(&result), expected);
    }

    #[test]
    fn test_serialize_leaves_out_backend_owned_fields() {
        let record: LiveRecord = serde_json::from_value(json!({
            "id": 12,
            "name": "Atlas",
            "city": "Rabat",
            "created_at": "2026-01-02T03:04:05Z",
            "addresses": [{"street": "Bd Zerktouni", "zip": "20000"}],
            "notes": {"internal": "x"},
            "user": {"id": 7, "email": "admin@atlas.ma", "last_login": "2026-02-01"},
            "custom_fields": {"partner_rib": "MA01", "synced_at": "2026-02-02"}
        }))
        .unwrap();

        let text = serialize(&record, Schema::standard());
        let result = parse(&text);
        assert!(result.is_clean());
        let keys: Vec<&str> = result.fields.iter().map(|f| f.raw_key.as_str()).collect();
        assert_eq!(keys, vec!["name", "city", "auth.email", "cf.partner_rib"]);

        let selection = crate::partner::default_selection(&result.fields, &record);
        assert!(crate::partner::apply(&result.fields, &selection).is_empty());
    }

    #[test]
    fn test_serialize_includes_fetched_custom_fields() {
        let schema = Schema::standard().with_custom_fields([crate::partner::FieldDef {
            key: "loyalty".into(),
            label: "Loyalty tier".into(),
        }]);
        let record: LiveRecord = serde_json::from_value(json!({
            "name": "Atlas",
            "custom_fields": {"loyalty": "gold"}
        }))
        .unwrap();

        let text = serialize(&record, &schema);
        assert!(text.contains("cf.loyalty__:gold;"));
        assert!(!serialize(&record, Schema::standard()).contains("loyalty"));
    }

    #[test]
    fn test_leading_byte_order_mark_is_ignored() {
        let result = parse("\u{feff}name__:Atlas;\ncity__:Rabat;\n");
        assert!(result.errors.is_empty());
        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.fields[0].raw_key, "name");
        assert_eq!(result.fields[0].line, 1);
    }
}
