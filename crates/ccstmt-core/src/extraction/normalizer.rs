//! Per-field cleanup of parsed values into typed outcomes.

use chrono::format::{Item, StrftimeItems};
use tracing::{trace, warn};

use super::parser::{ParsedResponse, is_not_found};
use super::rules::patterns::WHITESPACE_RUN;
use super::rules::{parse_amount, parse_date};
use crate::models::config::NormalizeConfig;
use crate::models::field::{FieldKind, FieldSelection, FieldSpec};
use crate::models::record::{DEFAULT_DATE_FORMAT, ExtractedRecord, FieldOutcome, FieldValue};

/// Turns raw model strings into [`FieldValue`]s.
///
/// Normalization never fails: a value that does not fit its field's type is
/// kept as cleaned text.
#[derive(Debug, Clone)]
pub struct Normalizer {
    date_format: String,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        let date_format = if is_valid_date_format(&config.date_format) {
            config.date_format.clone()
        } else {
            warn!(
                "Invalid date format {:?}, using {}",
                config.date_format, DEFAULT_DATE_FORMAT
            );
            DEFAULT_DATE_FORMAT.to_string()
        };
        Self { date_format }
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Normalize one raw value for `field`.
    pub fn normalize(&self, field: FieldSpec, raw: &str) -> FieldOutcome {
        let cleaned = clean_text(raw);
        if is_not_found(&cleaned) {
            return FieldOutcome::NotFound;
        }

        let value = match field.kind() {
            FieldKind::Text => FieldValue::Text(cleaned),
            FieldKind::CardDigits => FieldValue::Text(last_four_digits(&cleaned).unwrap_or(cleaned)),
            FieldKind::Date => match parse_date(&cleaned) {
                Some(date) => FieldValue::Date(date),
                None => {
                    trace!("{} kept as text: {:?}", field, cleaned);
                    FieldValue::Text(cleaned)
                }
            },
            FieldKind::Amount => match parse_amount(&cleaned) {
                Some(amount) => FieldValue::Amount(amount),
                None => {
                    trace!("{} kept as text: {:?}", field, cleaned);
                    FieldValue::Text(cleaned)
                }
            },
        };

        FieldOutcome::Found(value)
    }

    /// Build the final record for a selection from parsed values.
    pub fn normalize_all(&self, selection: &FieldSelection, parsed: &ParsedResponse) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(selection).with_date_format(self.date_format.clone());
        for field in selection.iter() {
            if let Some(raw) = parsed.get(field) {
                record.set(field, self.normalize(field, raw));
            }
        }
        record
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizeConfig::default())
    }
}

fn is_valid_date_format(format: &str) -> bool {
    !format.trim().is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Trim quotes, backticks, markdown emphasis and trailing separators, then
/// collapse runs of whitespace.
pub fn clean_text(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches([',', ';'])
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_') || c.is_whitespace())
        .trim_end_matches([',', ';'])
        .trim();
    WHITESPACE_RUN.replace_all(trimmed, " ").into_owned()
}

/// Last four digits of a masked card number such as "XXXX XXXX XXXX 1234".
fn last_four_digits(value: &str) -> Option<String> {
    let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn found(value: FieldValue) -> FieldOutcome {
        FieldOutcome::Found(value)
    }

    #[test]
    fn test_text_cleanup() {
        let n = Normalizer::default();
        assert_eq!(
            n.normalize(FieldSpec::CustomerName, "  **Mr.   Rupal\tPatel**, "),
            found(FieldValue::Text("Mr. Rupal Patel".into()))
        );
        assert_eq!(
            n.normalize(FieldSpec::Issuer, "\"HDFC Bank\";"),
            found(FieldValue::Text("HDFC Bank".into()))
        );
    }

    #[test]
    fn test_card_digits() {
        let n = Normalizer::default();
        assert_eq!(
            n.normalize(FieldSpec::CardLast4, "XXXX XXXX XXXX 5678"),
            found(FieldValue::Text("5678".into()))
        );
        assert_eq!(
            n.normalize(FieldSpec::CardLast4, "ending 12"),
            found(FieldValue::Text("ending 12".into()))
        );
    }

    #[test]
    fn test_dates_and_fallback() {
        let n = Normalizer::default();
        assert_eq!(
            n.normalize(FieldSpec::DueDate, "05/11/2024"),
            found(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()))
        );
        assert_eq!(
            n.normalize(FieldSpec::BillingCycleTo, "end of month"),
            found(FieldValue::Text("end of month".into()))
        );
    }

    #[test]
    fn test_amounts() {
        let n = Normalizer::default();
        assert_eq!(
            n.normalize(FieldSpec::TotalAmountDue, "₹13,429.57"),
            found(FieldValue::Amount(Decimal::from_str("13429.57").unwrap()))
        );
        assert_eq!(
            n.normalize(FieldSpec::TotalAmountDue, "13,429.57 Dr"),
            found(FieldValue::Text("13,429.57 Dr".into()))
        );
    }

    #[test]
    fn test_markers_after_cleanup() {
        let n = Normalizer::default();
        assert_eq!(n.normalize(FieldSpec::Issuer, " `N/A` "), FieldOutcome::NotFound);
    }

    #[test]
    fn test_invalid_date_format_falls_back() {
        let n = Normalizer::new(&NormalizeConfig {
            date_format: "%Q-%d".into(),
        });
        assert_eq!(n.date_format(), DEFAULT_DATE_FORMAT);

        let n = Normalizer::new(&NormalizeConfig {
            date_format: "%Y/%m/%d".into(),
        });
        assert_eq!(n.date_format(), "%Y/%m/%d");
    }

    #[test]
    fn test_record_covers_selection() {
        let selection = FieldSelection::parse(&["issuer", "due_date"]).unwrap();
        let parsed = crate::extraction::ResponseParser::new()
            .parse(r#"{"issuer": "HDFC Bank", "due_date": "2024-11-05"}"#, &selection);

        let record = Normalizer::default().normalize_all(&selection, &parsed);
        assert_eq!(record.len(), 2);
        assert_eq!(record.rendered(FieldSpec::DueDate), Some(Some("05-11-2024".to_string())));
        assert_eq!(record.rendered(FieldSpec::CardLast4), None);
    }
}
