//! `.partner` file import/export.
//!
//! - **Codec**: `.partner` text ⇄ typed fields
//! - **Schema**: known fields and display labels per section
//! - **Reconcile**: classify parsed fields against a live record and
//!   materialize a selected subset
//! - **File**: name validation, reading, atomic writes
//!
//! # File Format
//!
//! ```text
//! # comment
//! name__:Supermarché Atlas;
//! auth.email__:admin@atlas.ma;
//! cf.partner_rib__:MA0123456789012345678;
//! ```
//!
//! # Example
//!
//! ```ignore
//! use erp::partner::{parse, default_selection, apply};
//!
//! let parsed = parse(&text);
//! let selection = default_selection(&parsed.fields, &live);
//! let applied = apply(&parsed.fields, &selection);
//! client.patch_json(&path, &applied.to_patch_body()).await?;
//! ```

mod codec;
mod file;
mod reconcile;
mod schema;
mod types;

pub use codec::{
    FORMAT_VERSION, SEPARATOR, TERMINATOR, parse, parse_with_schema, serialize, serialize_at,
};
pub use file::{
    EXTENSION, read_partner_file, validate_file_name, write_atomic, write_partner_file,
};
pub use reconcile::{
    PreviewRow, ReconcileSummary, Selection, apply, classify, default_selection, preview,
};
pub use schema::{FieldDef, Schema};
pub use types::{
    AUTH_FIELD, AppliedResult, CUSTOM_FIELD, FieldKey, FieldStatus, LiveRecord, ParseError,
    ParseErrorKind, ParseResult, ParseWarning, ParsedField, Section, WarningKind, value_text,
};
