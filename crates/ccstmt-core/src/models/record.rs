//! The structured record produced by an extraction.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::field::{FieldSelection, FieldSpec};

/// Default rendering for dates.
pub const DEFAULT_DATE_FORMAT: &str = "%d-%m-%Y";

/// A normalized field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text, or a value that could not be coerced.
    Text(String),
    /// Monetary amount without currency symbol or grouping.
    Amount(Decimal),
    /// Calendar date.
    Date(NaiveDate),
}

impl FieldValue {
    /// Render using the given chrono format for dates.
    pub fn render(&self, date_format: &str) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Amount(d) => d.to_string(),
            FieldValue::Date(d) => d.format(date_format).to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_DATE_FORMAT))
    }
}

/// Outcome for one requested field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Found(FieldValue),
    /// The field was requested but the model did not answer it.
    NotFound,
}

impl FieldOutcome {
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            FieldOutcome::Found(v) => Some(v),
            FieldOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldOutcome::Found(_))
    }
}

/// Mapping from every requested field to its outcome.
///
/// `get` returns `None` only for fields that were never requested; requested
/// fields the model missed are present as [`FieldOutcome::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    values: BTreeMap<FieldSpec, FieldOutcome>,
    date_format: String,
}

impl ExtractedRecord {
    /// A record with every selected field set to `NotFound`.
    pub fn new(selection: &FieldSelection) -> Self {
        Self {
            values: selection.iter().map(|f| (f, FieldOutcome::NotFound)).collect(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Set the chrono format used when rendering dates.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Record an outcome. Fields outside the selection are ignored.
    pub fn set(&mut self, field: FieldSpec, outcome: FieldOutcome) {
        if let Some(slot) = self.values.get_mut(&field) {
            *slot = outcome;
        }
    }

    pub fn get(&self, field: FieldSpec) -> Option<&FieldOutcome> {
        self.values.get(&field)
    }

    /// Rendered value: `None` when not requested, `Some(None)` when not found.
    pub fn rendered(&self, field: FieldSpec) -> Option<Option<String>> {
        self.get(field)
            .map(|o| o.value().map(|v| v.render(&self.date_format)))
    }

    /// Fields in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = FieldSpec> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldSpec, &FieldOutcome)> + '_ {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn found_count(&self) -> usize {
        self.values.values().filter(|o| o.is_found()).count()
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, outcome) in &self.values {
            let rendered = outcome.value().map(|v| v.render(&self.date_format));
            map.serialize_entry(field.as_str(), &rendered)?;
        }
        map.end()
    }
}
