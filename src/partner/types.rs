//! Types for `.partner` files and the records they are reconciled against.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Backend field holding the user-account sub-record of a partner.
pub const AUTH_FIELD: &str = "user";

/// Backend field holding the custom-field sub-record of a partner.
pub const CUSTOM_FIELD: &str = "custom_fields";

/// Which target record a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Partner profile (no key prefix).
    Profile,
    /// User account attached to the partner (`auth.` prefix).
    Auth,
    /// Custom field (`cf.` prefix).
    Custom,
}

impl Section {
    /// All sections in canonical file order.
    pub const ALL: [Self; 3] = [Self::Profile, Self::Auth, Self::Custom];

    /// Key prefix used in `.partner` files.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Profile => "",
            Self::Auth => "auth.",
            Self::Custom => "cf.",
        }
    }

    /// Route a raw file key to its section and canonical key.
    #[must_use]
    pub fn route(raw_key: &str) -> (Self, &str) {
        if let Some(rest) = raw_key.strip_prefix(Self::Auth.prefix()) {
            (Self::Auth, rest)
        } else if let Some(rest) = raw_key.strip_prefix(Self::Custom.prefix()) {
            (Self::Custom, rest)
        } else {
            (Self::Profile, raw_key)
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Auth => write!(f, "auth"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// One key/value pair extracted from a `.partner` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedField {
    /// Key exactly as written, prefix included.
    pub raw_key: String,
    /// Key used to look the field up on the live record.
    pub canonical_key: String,
    pub section: Section,
    /// Raw string value, trimmed.
    pub value: String,
    /// Whether the schema knows `canonical_key` for this section.
    pub recognized: bool,
    pub display_label: String,
    /// 1-based line number in the source text.
    pub line: usize,
}

impl ParsedField {
    /// Occurrence-specific selection key for this field.
    #[must_use]
    pub fn key(&self) -> FieldKey {
        FieldKey::at(&self.raw_key, self.line)
    }
}

/// Why a line failed the `key__:value;` grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// No `__:` separator on the line.
    MissingSeparator,
    /// The line does not end with `;`.
    MissingTerminator,
    /// Key is empty or contains characters outside `[A-Za-z0-9_.]`.
    InvalidKey,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing `__:` separator"),
            Self::MissingTerminator => write!(f, "missing trailing `;`"),
            Self::InvalidKey => write!(f, "invalid key"),
        }
    }
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    /// Line number (1-indexed).
    pub line: usize,
    /// The offending text.
    pub text: String,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.text)
    }
}

/// Non-fatal observation about a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    UnknownKey,
    DuplicateKey { first_line: usize },
}

/// A parsed line that deserves a second look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// Line number (1-indexed).
    pub line: usize,
    /// Raw key of the field.
    pub key: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::UnknownKey => write!(f, "line {}: unknown key `{}`", self.line, self.key),
            WarningKind::DuplicateKey { first_line } => write!(
                f,
                "line {}: duplicate key `{}` (first seen on line {first_line})",
                self.line, self.key
            ),
        }
    }
}

/// Output of parsing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    /// Fields in order of appearance, duplicates kept.
    pub fields: Vec<ParsedField>,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseResult {
    /// True if no line failed to parse.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Selection key for a parsed field.
///
/// With a line number it designates one occurrence; without one it
/// designates every occurrence of `raw_key`. Written `key@line` or `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldKey {
    pub raw_key: String,
    pub line: Option<usize>,
}

impl FieldKey {
    /// Key matching every occurrence of `raw_key`.
    #[must_use]
    pub fn raw(raw_key: &str) -> Self {
        Self {
            raw_key: raw_key.to_string(),
            line: None,
        }
    }

    /// Key matching the occurrence of `raw_key` on `line`.
    #[must_use]
    pub fn at(raw_key: &str, line: usize) -> Self {
        Self {
            raw_key: raw_key.to_string(),
            line: Some(line),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}@{line}", self.raw_key),
            None => write!(f, "{}", self.raw_key),
        }
    }
}

impl std::str::FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty field key".to_string());
        }
        match s.rsplit_once('@') {
            Some((key, line)) => {
                let line = line
                    .parse::<usize>()
                    .map_err(|_| format!("invalid line number in field key: {s}"))?;
                Ok(Self::at(key, line))
            }
            None => Ok(Self::raw(s)),
        }
    }
}

/// Status of a parsed field relative to the live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    New,
    Modified,
    Unchanged,
    Unknown,
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Modified => write!(f, "modified"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for FieldStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "modified" => Ok(Self::Modified),
            "unchanged" => Ok(Self::Unchanged),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown field status: {s}")),
        }
    }
}

/// The live partner record a file is reconciled against.
///
/// Mirrors the backend partner payload: profile fields at the top level,
/// the user account under `user` and custom fields under `custom_fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveRecord {
    #[serde(default, alias = "user", deserialize_with = "null_as_empty")]
    pub auth: Map<String, Value>,
    #[serde(default, alias = "custom_fields", deserialize_with = "null_as_empty")]
    pub custom: Map<String, Value>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl LiveRecord {
    /// The sub-record backing `section`.
    #[must_use]
    pub fn section(&self, section: Section) -> &Map<String, Value> {
        match section {
            Section::Profile => &self.profile,
            Section::Auth => &self.auth,
            Section::Custom => &self.custom,
        }
    }

    /// Mutable access to the sub-record backing `section`.
    pub fn section_mut(&mut self, section: Section) -> &mut Map<String, Value> {
        match section {
            Section::Profile => &mut self.profile,
            Section::Auth => &mut self.auth,
            Section::Custom => &mut self.custom,
        }
    }

    /// String form of the value at `key`, `None` if absent or null.
    #[must_use]
    pub fn get(&self, section: Section, key: &str) -> Option<String> {
        self.section(section).get(key).and_then(value_text)
    }
}

/// Render a JSON value the way it appears in a `.partner` file.
///
/// Strings are taken verbatim, other scalars use their JSON text.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields selected for application, bucketed by section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedResult {
    pub profile: BTreeMap<String, String>,
    pub auth: BTreeMap<String, String>,
    pub custom: BTreeMap<String, String>,
}

impl AppliedResult {
    /// Mutable bucket for `section`.
    pub fn bucket_mut(&mut self, section: Section) -> &mut BTreeMap<String, String> {
        match section {
            Section::Profile => &mut self.profile,
            Section::Auth => &mut self.auth,
            Section::Custom => &mut self.custom,
        }
    }

    /// Number of applied entries across all sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profile.len() + self.auth.len() + self.custom.len()
    }

    /// Returns true if nothing was applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partial-update body for the partner endpoint.
    ///
    /// Empty sections are omitted so the server leaves them untouched.
    #[must_use]
    pub fn to_patch_body(&self) -> Value {
        let mut body: Map<String, Value> = self
            .profile
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        if !self.auth.is_empty() {
            body.insert(AUTH_FIELD.to_string(), string_map(&self.auth));
        }
        if !self.custom.is_empty() {
            body.insert(CUSTOM_FIELD.to_string(), string_map(&self.custom));
        }

        Value::Object(body)
    }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_route() {
        assert_eq!(Section::route("auth.email"), (Section::Auth, "email"));
        assert_eq!(Section::route("cf.partner_rib"), (Section::Custom, "partner_rib"));
        assert_eq!(Section::route("name"), (Section::Profile, "name"));
        // Only a leading prefix routes.
        assert_eq!(Section::route("x.auth.email"), (Section::Profile, "x.auth.email"));
    }

    #[test]
    fn test_field_key_round_trip() {
        let key: FieldKey = "auth.email@7".parse().unwrap();
        assert_eq!(key, FieldKey::at("auth.email", 7));
        assert_eq!(key.to_string(), "auth.email@7");

        let key: FieldKey = "city".parse().unwrap();
        assert_eq!(key, FieldKey::raw("city"));
        assert!("city@x".parse::<FieldKey>().is_err());
    }

    #[test]
    fn test_live_record_accepts_backend_shape() {
        let live: LiveRecord = serde_json::from_value(json!({
            "name": "Supermarché Atlas",
            "credit_limit": 15000,
            "user": {"email": "admin@atlas.ma"},
            "custom_fields": null
        }))
        .unwrap();

        assert_eq!(live.get(Section::Profile, "name").as_deref(), Some("Supermarché Atlas"));
        assert_eq!(live.get(Section::Profile, "credit_limit").as_deref(), Some("15000"));
        assert_eq!(live.get(Section::Auth, "email").as_deref(), Some("admin@atlas.ma"));
        assert!(live.custom.is_empty());
        assert!(!live.profile.contains_key("user"));
    }

    #[test]
    fn test_patch_body_omits_empty_sections() {
        let mut applied = AppliedResult::default();
        applied.profile.insert("city".into(), "Rabat".into());
        applied.custom.insert("partner_rib".into(), "MA01".into());

        let body = applied.to_patch_body();
        assert_eq!(body["city"], "Rabat");
        assert_eq!(body[CUSTOM_FIELD]["partner_rib"], "MA01");
        assert!(body.get(AUTH_FIELD).is_none());
        assert_eq!(applied.len(), 2);
    }
}
