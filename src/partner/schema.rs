//! Known partner fields and their display labels.
//!
//! The profile and account tables are fixed. Custom fields start from a
//! default table and can be extended with the definitions the backend
//! reports for the current tenant.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::types::Section;

const PROFILE_FIELDS: &[(&str, &str)] = &[
    ("name", "Company name"),
    ("code", "Partner code"),
    ("partner_type", "Partner type"),
    ("status", "Status"),
    ("ice", "ICE"),
    ("rc", "Trade register (RC)"),
    ("patente", "Patente"),
    ("if_number", "Tax ID (IF)"),
    ("cnss", "CNSS"),
    ("address", "Address"),
    ("city", "City"),
    ("region", "Region"),
    ("zone", "Delivery zone"),
    ("phone", "Phone"),
    ("mobile", "Mobile"),
    ("email", "Email"),
    ("website", "Website"),
    ("contact_name", "Contact name"),
    ("channel", "Sales channel"),
    ("price_list", "Price list"),
    ("payment_term", "Payment term"),
    ("payment_method", "Payment method"),
    ("credit_limit", "Credit limit"),
    ("latitude", "Latitude"),
    ("longitude", "Longitude"),
    ("notes", "Notes"),
];

const AUTH_FIELDS: &[(&str, &str)] = &[
    ("username", "Username"),
    ("email", "Login email"),
    ("first_name", "First name"),
    ("last_name", "Last name"),
    ("phone", "Login phone"),
    ("role", "Role"),
    ("is_active", "Account active"),
];

const DEFAULT_CUSTOM_FIELDS: &[(&str, &str)] = &[
    ("partner_rib", "Bank account (RIB)"),
    ("partner_bank", "Bank"),
    ("delivery_window", "Delivery window"),
    ("warehouse_code", "Warehouse code"),
];

static STANDARD: LazyLock<Schema> = LazyLock::new(|| Schema {
    profile: to_defs(PROFILE_FIELDS),
    auth: to_defs(AUTH_FIELDS),
    custom: to_defs(DEFAULT_CUSTOM_FIELDS),
});

fn to_defs(table: &[(&str, &str)]) -> Vec<FieldDef> {
    table
        .iter()
        .map(|(key, label)| FieldDef {
            key: (*key).to_string(),
            label: (*label).to_string(),
        })
        .collect()
}

/// A known field: canonical key and human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    #[serde(alias = "name")]
    pub label: String,
}

/// Field tables per section, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    profile: Vec<FieldDef>,
    auth: Vec<FieldDef>,
    custom: Vec<FieldDef>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::standard().clone()
    }
}

impl Schema {
    /// The built-in schema.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Copy of this schema with additional custom-field definitions.
    ///
    /// Definitions for keys that are already known replace the label only.
    #[must_use]
    pub fn with_custom_fields(&self, defs: impl IntoIterator<Item = FieldDef>) -> Self {
        let mut schema = self.clone();
        for def in defs {
            match schema.custom.iter_mut().find(|d| d.key == def.key) {
                Some(existing) => existing.label = def.label,
                None => schema.custom.push(def),
            }
        }
        schema
    }

    /// Field definitions for `section`, in canonical order.
    #[must_use]
    pub fn fields(&self, section: Section) -> &[FieldDef] {
        match section {
            Section::Profile => &self.profile,
            Section::Auth => &self.auth,
            Section::Custom => &self.custom,
        }
    }

    /// Whether `key` is a known field of `section`.
    #[must_use]
    pub fn is_known(&self, section: Section, key: &str) -> bool {
        self.fields(section).iter().any(|d| d.key == key)
    }

    /// Label for a known field.
    #[must_use]
    pub fn label(&self, section: Section, key: &str) -> Option<&str> {
        self.fields(section)
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_sections() {
        let schema = Schema::standard();
        assert!(schema.is_known(Section::Profile, "city"));
        assert!(schema.is_known(Section::Auth, "email"));
        assert!(schema.is_known(Section::Custom, "partner_rib"));
        assert!(!schema.is_known(Section::Auth, "city"));
        assert_eq!(schema.label(Section::Profile, "ice"), Some("ICE"));
        assert_eq!(schema.label(Section::Profile, "nope"), None);
    }

    #[test]
    fn test_with_custom_fields_extends_and_relabels() {
        let schema = Schema::standard().with_custom_fields([
            FieldDef {
                key: "loyalty_tier".into(),
                label: "Loyalty tier".into(),
            },
            FieldDef {
                key: "partner_rib".into(),
                label: "RIB".into(),
            },
        ]);

        assert!(schema.is_known(Section::Custom, "loyalty_tier"));
        assert_eq!(schema.label(Section::Custom, "partner_rib"), Some("RIB"));
        assert_eq!(
            schema.fields(Section::Custom).len(),
            Schema::standard().fields(Section::Custom).len() + 1
        );
        // The built-in schema is untouched.
        assert!(!Schema::standard().is_known(Section::Custom, "loyalty_tier"));
    }
}
