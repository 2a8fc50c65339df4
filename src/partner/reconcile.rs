//! Reconciliation of parsed fields against a live partner record.
//!
//! Everything here is a pure function of its inputs. The live record is
//! only read; callers decide how to merge an [`AppliedResult`].

use std::collections::BTreeSet;

use serde::Serialize;

use super::types::{AppliedResult, FieldKey, FieldStatus, LiveRecord, ParsedField, Section};

/// Classify a parsed field relative to the live record.
///
/// Comparison is on exact strings: no trimming, no type coercion.
#[must_use]
pub fn classify(field: &ParsedField, live: &LiveRecord) -> FieldStatus {
    if !field.recognized {
        return FieldStatus::Unknown;
    }

    match live.get(field.section, &field.canonical_key) {
        None => FieldStatus::New,
        Some(current) if current.is_empty() => FieldStatus::New,
        Some(current) if current == field.value => FieldStatus::Unchanged,
        Some(_) => FieldStatus::Modified,
    }
}

/// Set of fields chosen for application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    keys: BTreeSet<FieldKey>,
}

impl Selection {
    /// Empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection matching every occurrence of each raw key.
    pub fn from_raw_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter().map(|k| FieldKey::raw(k.as_ref())).collect()
    }

    pub fn insert(&mut self, key: FieldKey) {
        self.keys.insert(key);
    }

    /// Remove a key. A key without a line number removes every entry for
    /// that raw key.
    pub fn exclude(&mut self, key: &FieldKey) {
        match key.line {
            Some(_) => {
                self.keys.remove(key);
            }
            None => self.keys.retain(|k| k.raw_key != key.raw_key),
        }
    }

    /// Whether `field` is selected, either by occurrence or by raw key.
    #[must_use]
    pub fn contains(&self, field: &ParsedField) -> bool {
        self.keys.contains(&field.key()) || self.keys.contains(&FieldKey::raw(&field.raw_key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldKey> {
        self.keys.iter()
    }
}

impl FromIterator<FieldKey> for Selection {
    fn from_iter<T: IntoIterator<Item = FieldKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Materialize the selected fields.
///
/// Fields are visited in file order, so when several selected fields share
/// a canonical key within a section the last one wins. Selection keys that
/// match no field are ignored.
#[must_use]
pub fn apply(fields: &[ParsedField], selection: &Selection) -> AppliedResult {
    let mut result = AppliedResult::default();

    for field in fields.iter().filter(|f| selection.contains(f)) {
        result
            .bucket_mut(field.section)
            .insert(field.canonical_key.clone(), field.value.clone());
    }

    result
}

/// Selection used when a file is first loaded.
///
/// Every field that is not `Unchanged` starts selected, `Unknown` fields
/// included.
#[must_use]
pub fn default_selection(fields: &[ParsedField], live: &LiveRecord) -> Selection {
    fields
        .iter()
        .filter(|f| classify(f, live) != FieldStatus::Unchanged)
        .map(ParsedField::key)
        .collect()
}

/// One row of an import preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub key: FieldKey,
    pub raw_key: String,
    pub label: String,
    pub section: Section,
    pub status: FieldStatus,
    /// Current live value, if any.
    pub current: Option<String>,
    /// Value from the file.
    pub incoming: String,
    pub selected: bool,
}

/// Build preview rows for every parsed field, in file order.
#[must_use]
pub fn preview(
    fields: &[ParsedField],
    live: &LiveRecord,
    selection: &Selection,
) -> Vec<PreviewRow> {
    fields
        .iter()
        .map(|field| PreviewRow {
            key: field.key(),
            raw_key: field.raw_key.clone(),
            label: field.display_label.clone(),
            section: field.section,
            status: classify(field, live),
            current: live.get(field.section, &field.canonical_key),
            incoming: field.value.clone(),
            selected: selection.contains(field),
        })
        .collect()
}

/// Per-status counts over a preview.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub unknown: usize,
    pub selected: usize,
}

impl ReconcileSummary {
    /// Count statuses and selections over `rows`.
    #[must_use]
    pub fn from_rows(rows: &[PreviewRow]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            match row.status {
                FieldStatus::New => summary.new += 1,
                FieldStatus::Modified => summary.modified += 1,
                FieldStatus::Unchanged => summary.unchanged += 1,
                FieldStatus::Unknown => summary.unknown += 1,
            }
            if row.selected {
                summary.selected += 1;
            }
        }
        summary
    }

    /// Total rows counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.new + self.modified + self.unchanged + self.unknown
    }

    /// Rows whose application would change the record.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.new + self.modified
    }
}
