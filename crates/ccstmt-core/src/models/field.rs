//! The closed set of statement fields and validated selections of them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// A statement attribute the pipeline knows how to extract.
///
/// Declaration order is the canonical order used in prompts and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpec {
    /// Bank or institution that issued the card.
    Issuer,
    /// Cardholder name as printed.
    CustomerName,
    /// Last four digits of the card number.
    #[serde(rename = "card_last4")]
    CardLast4,
    /// First day of the billing cycle.
    BillingCycleFrom,
    /// Last day of the billing cycle.
    BillingCycleTo,
    /// Payment due date.
    DueDate,
    /// Total amount due for the cycle.
    TotalAmountDue,
}

/// Broad value class of a field, used to pick a normalization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    CardDigits,
    Date,
    Amount,
}

impl FieldSpec {
    /// Every field, in canonical order.
    pub const ALL: [FieldSpec; 7] = [
        FieldSpec::Issuer,
        FieldSpec::CustomerName,
        FieldSpec::CardLast4,
        FieldSpec::BillingCycleFrom,
        FieldSpec::BillingCycleTo,
        FieldSpec::DueDate,
        FieldSpec::TotalAmountDue,
    ];

    /// Stable identifier used in prompts, CLI arguments and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldSpec::Issuer => "issuer",
            FieldSpec::CustomerName => "customer_name",
            FieldSpec::CardLast4 => "card_last4",
            FieldSpec::BillingCycleFrom => "billing_cycle_from",
            FieldSpec::BillingCycleTo => "billing_cycle_to",
            FieldSpec::DueDate => "due_date",
            FieldSpec::TotalAmountDue => "total_amount_due",
        }
    }

    /// Human-readable description embedded in the extraction prompt.
    pub fn description(self) -> &'static str {
        match self {
            FieldSpec::Issuer => {
                "the name of the bank or institution that issued the card, e.g. \"HDFC Bank\""
            }
            FieldSpec::CustomerName => {
                "the full name of the cardholder exactly as printed, including any title such as Mr. or Ms."
            }
            FieldSpec::CardLast4 => "the last four digits of the credit card number",
            FieldSpec::BillingCycleFrom => {
                "the first day of the statement billing cycle in DD-MM-YYYY format"
            }
            FieldSpec::BillingCycleTo => {
                "the last day of the statement billing cycle in DD-MM-YYYY format"
            }
            FieldSpec::DueDate => "the payment due date in DD-MM-YYYY format",
            FieldSpec::TotalAmountDue => {
                "the total amount due exactly as printed, including the currency symbol"
            }
        }
    }

    /// Labels a model may use for this field in its answer.
    ///
    /// Compared after [`normalize_label`], so spacing, case and punctuation
    /// do not matter here.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            FieldSpec::Issuer => &["issuer", "issuer name", "bank", "bank name", "issuing bank", "card issuer"],
            FieldSpec::CustomerName => &[
                "customer name",
                "customer",
                "cardholder name",
                "card holder name",
                "cardholder",
                "name",
            ],
            FieldSpec::CardLast4 => &[
                "card last4",
                "card last 4",
                "card last 4 digits",
                "last 4 digits",
                "last four digits",
                "card number last 4",
            ],
            FieldSpec::BillingCycleFrom => &[
                "billing cycle from",
                "billing period from",
                "statement period from",
                "billing cycle start",
                "statement from",
            ],
            FieldSpec::BillingCycleTo => &[
                "billing cycle to",
                "billing period to",
                "statement period to",
                "billing cycle end",
                "statement to",
            ],
            FieldSpec::DueDate => &["due date", "payment due date", "payment due"],
            FieldSpec::TotalAmountDue => &[
                "total amount due",
                "total due",
                "total amount",
                "total outstanding",
                "amount due",
            ],
        }
    }

    /// Value class of this field.
    pub fn kind(self) -> FieldKind {
        match self {
            FieldSpec::Issuer | FieldSpec::CustomerName => FieldKind::Text,
            FieldSpec::CardLast4 => FieldKind::CardDigits,
            FieldSpec::BillingCycleFrom | FieldSpec::BillingCycleTo | FieldSpec::DueDate => {
                FieldKind::Date
            }
            FieldSpec::TotalAmountDue => FieldKind::Amount,
        }
    }

    /// Whether a normalized label names this field.
    pub fn matches_label(self, normalized: &str) -> bool {
        !normalized.is_empty()
            && (normalize_label(self.as_str()) == normalized
                || self.aliases().iter().any(|a| normalize_label(a) == normalized))
    }

    /// Resolve a normalized label to the first field it names.
    pub fn from_label(normalized: &str) -> Option<FieldSpec> {
        FieldSpec::ALL.into_iter().find(|f| f.matches_label(normalized))
    }
}

/// Lowercase a label and drop everything that is not alphanumeric.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldSpec {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        FieldSpec::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| SelectionError::UnknownField(s.trim().to_string()))
    }
}

/// A validated, non-empty set of requested fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    fields: BTreeSet<FieldSpec>,
}

impl FieldSelection {
    /// Build a selection, rejecting an empty set.
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> Result<Self, SelectionError> {
        let fields: BTreeSet<FieldSpec> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(Self { fields })
    }

    /// Every supported field.
    pub fn all() -> Self {
        Self {
            fields: FieldSpec::ALL.into_iter().collect(),
        }
    }

    /// Parse identifiers supplied by a caller. Blank entries are ignored.
    pub fn parse<S: AsRef<str>>(ids: &[S]) -> Result<Self, SelectionError> {
        let fields = ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.trim().is_empty())
            .map(FieldSpec::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    /// Iterate in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = FieldSpec> + '_ {
        self.fields.iter().copied()
    }

    pub fn contains(&self, field: FieldSpec) -> bool {
        self.fields.contains(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a constructed selection.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_non_empty_subset_is_accepted() {
        for mask in 1u32..(1 << FieldSpec::ALL.len()) {
            let subset: Vec<FieldSpec> = FieldSpec::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, f)| *f)
                .collect();

            let selection = FieldSelection::new(subset.clone()).unwrap();
            assert_eq!(selection.len(), subset.len());
        }
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        assert_eq!(FieldSelection::new([]), Err(SelectionError::Empty));
        assert_eq!(
            FieldSelection::parse(&["", "  "]),
            Err(SelectionError::Empty)
        );
    }

    #[test]
    fn test_parse_identifiers() {
        let selection = FieldSelection::parse(&["Due-Date", "issuer", "issuer"]).unwrap();
        let fields: Vec<_> = selection.iter().collect();
        assert_eq!(fields, vec![FieldSpec::Issuer, FieldSpec::DueDate]);
    }

    #[test]
    fn test_unknown_identifier_is_rejected() {
        assert_eq!(
            FieldSelection::parse(&["issuer", "minimum_amount_due"]),
            Err(SelectionError::UnknownField("minimum_amount_due".to_string()))
        );
    }

    #[test]
    fn test_label_matching() {
        assert_eq!(FieldSpec::from_label(&normalize_label("Card Last 4 Digits")), Some(FieldSpec::CardLast4));
        assert_eq!(FieldSpec::from_label(&normalize_label("**Payment Due Date**")), Some(FieldSpec::DueDate));
        assert_eq!(FieldSpec::from_label(&normalize_label("total_amount_due")), Some(FieldSpec::TotalAmountDue));
        assert_eq!(FieldSpec::from_label(&normalize_label("minimum amount due")), None);
        assert_eq!(FieldSpec::from_label(""), None);
    }

    #[test]
    fn test_identifier_roundtrip_with_serde() {
        for field in FieldSpec::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
    }
}
