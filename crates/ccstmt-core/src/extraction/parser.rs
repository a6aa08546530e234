//! Tolerant parsing of model responses into per-field raw values.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, trace};

use super::rules::patterns::{CODE_FENCE, LIST_MARKER};
use crate::models::field::{FieldSelection, FieldSpec, normalize_label};

/// Marker the prompt asks the model to use for missing fields.
pub const NOT_FOUND_MARKER: &str = "NOT_FOUND";

/// Delimiters between a label and its value on a plain-text line.
const LINE_DELIMITERS: [&str; 4] = ["->", ":", "=", "|"];

/// Whether a value means "the model could not find this".
pub fn is_not_found(value: &str) -> bool {
    let cleaned = value
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_' | '.') || c.is_whitespace())
        .to_lowercase();

    matches!(
        cleaned.as_str(),
        "" | "not_found" | "not found" | "notfound" | "n/a" | "na" | "null" | "none" | "unknown" | "-"
    )
}

/// Raw per-field values recovered from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Every requested field; `None` means not found.
    pub values: BTreeMap<FieldSpec, Option<String>>,
    /// True when the response had no JSON object and no labelled line matched.
    pub unstructured: bool,
}

impl ParsedResponse {
    pub fn get(&self, field: FieldSpec) -> Option<&str> {
        self.values.get(&field).and_then(|v| v.as_deref())
    }

    pub fn found_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }
}

/// Parses model output: a JSON object first, labelled lines second.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Map a raw response onto the selection. Never fails.
    pub fn parse(&self, response: &str, selection: &FieldSelection) -> ParsedResponse {
        let mut values: BTreeMap<FieldSpec, Option<String>> =
            selection.iter().map(|f| (f, None)).collect();

        let json = json_object(response);
        let mut settled = BTreeSet::new();
        let mut line_matches = 0;

        if let Some((object, _)) = &json {
            // Exact identifiers first so an alias key never shadows them
            for exact in [true, false] {
                for (key, value) in object {
                    let label = normalize_label(key);
                    let field = selection.iter().find(|f| {
                        if exact {
                            normalize_label(f.as_str()) == label
                        } else {
                            f.matches_label(&label)
                        }
                    });
                    let Some(field) = field else {
                        if !exact {
                            trace!("Ignoring JSON key {:?}", key);
                        }
                        continue;
                    };
                    if settled.insert(field) {
                        values.insert(field, json_value(value));
                    }
                }
            }
        }

        let pending: Vec<FieldSpec> = selection
            .iter()
            .filter(|f| !settled.contains(f))
            .collect();

        if !pending.is_empty() {
            // Lines inside a parsed object were already accounted for
            let text = json.as_ref().map_or(response, |(_, rest)| rest.as_str());
            for line in text.lines() {
                let Some((label, value)) = split_labelled_line(line) else {
                    continue;
                };
                let Some(field) = pending.iter().copied().find(|f| f.matches_label(&label)) else {
                    continue;
                };
                line_matches += 1;

                if let Some(slot) = values.get_mut(&field) {
                    if slot.is_none() && !is_not_found(&value) {
                        *slot = Some(value);
                    }
                }
            }
        }

        let parsed = ParsedResponse {
            unstructured: json.is_none() && line_matches == 0,
            values,
        };

        debug!(
            "Parsed response: {} of {} fields found (json: {}, labelled lines: {})",
            parsed.found_count(),
            parsed.values.len(),
            json.is_some(),
            line_matches
        );
        parsed
    }
}

/// The object spanning the first `{` to the last `}`, with the text around it.
///
/// A span that is not valid JSON gets one repair attempt for the usual model
/// slips: trailing commas, single quotes and Python literals.
fn json_object(response: &str) -> Option<(serde_json::Map<String, Value>, String)> {
    let unfenced = CODE_FENCE.replace_all(response, "");
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }

    let span = &unfenced[start..=end];
    let object = match parse_object(span) {
        Some(object) => object,
        None => {
            let object = parse_object(&repair_json(span))?;
            debug!("Response JSON parsed after repair");
            object
        }
    };

    let rest = format!("{}\n{}", &unfenced[..start], &unfenced[end + 1..]);
    Some((object, rest))
}

fn parse_object(span: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!("Response braces did not hold valid JSON: {}", e);
            None
        }
    }
}

/// Rewrite near-JSON into JSON. Double-quoted strings pass through untouched.
fn repair_json(span: &str) -> String {
    let mut out = String::with_capacity(span.len());
    let mut chars = span.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(d) = chars.next() {
                    out.push(d);
                    match d {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(d) = chars.next() {
                    match d {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => {}
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(d),
                    }
                }
                out.push('"');
            }
            ',' => {
                let next = chars.clone().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    out.push(c);
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if !(n.is_ascii_alphanumeric() || n == '_') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    _ => &word,
                });
            }
            _ => out.push(c),
        }
    }

    out
}

fn json_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_not_found(s) => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Split "**Due Date**: 05-11-2024" into ("duedate", "05-11-2024").
fn split_labelled_line(line: &str) -> Option<(String, String)> {
    let line = line.trim().trim_matches('|').trim();
    let line = LIST_MARKER.find(line).map_or(line, |m| &line[m.end()..]);

    let (at, delimiter) = LINE_DELIMITERS
        .iter()
        .filter_map(|d| line.find(d).map(|i| (i, *d)))
        .min_by_key(|(i, _)| *i)?;

    let label = normalize_label(&line[..at]);
    if label.is_empty() {
        return None;
    }

    let value = line[at + delimiter.len()..]
        .trim()
        .trim_matches('|')
        .trim()
        .to_string();
    Some((label, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selection(ids: &[&str]) -> FieldSelection {
        FieldSelection::parse(ids).unwrap()
    }

    #[test]
    fn test_json_response() {
        let response = r#"{"issuer": "HDFC Bank", "customer_name": "Mr. Rupal Patel", "total_amount_due": "₹13,429.57"}"#;
        let parsed = ResponseParser::new().parse(
            response,
            &selection(&["issuer", "customer_name", "total_amount_due"]),
        );

        assert!(!parsed.unstructured);
        assert_eq!(parsed.get(FieldSpec::Issuer), Some("HDFC Bank"));
        assert_eq!(parsed.get(FieldSpec::CustomerName), Some("Mr. Rupal Patel"));
        assert_eq!(parsed.get(FieldSpec::TotalAmountDue), Some("₹13,429.57"));
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let response = "Here is the data:\n```json\n{\n  \"Issuer\": \"Axis Bank\",\n  \"Due Date\": \"05-11-2024\"\n}\n```\nLet me know!";
        let parsed = ResponseParser::new().parse(response, &selection(&["issuer", "due_date"]));

        assert_eq!(parsed.get(FieldSpec::Issuer), Some("Axis Bank"));
        assert_eq!(parsed.get(FieldSpec::DueDate), Some("05-11-2024"));
    }

    #[test]
    fn test_three_of_five_fields() {
        let response = r#"{"issuer": "HDFC Bank", "card_last4": "1234", "due_date": "05-11-2024", "billing_cycle_from": "NOT_FOUND"}"#;
        let parsed = ResponseParser::new().parse(
            response,
            &selection(&[
                "issuer",
                "card_last4",
                "due_date",
                "billing_cycle_from",
                "total_amount_due",
            ]),
        );

        assert_eq!(parsed.values.len(), 5);
        assert_eq!(parsed.found_count(), 3);
        assert_eq!(parsed.values[&FieldSpec::BillingCycleFrom], None);
        assert_eq!(parsed.values[&FieldSpec::TotalAmountDue], None);
    }

    #[test]
    fn test_json_value_kinds() {
        let response = r#"{"card_last4": 1234, "issuer": null, "due_date": ["05-11-2024"], "customer_name": true}"#;
        let parsed = ResponseParser::new().parse(
            response,
            &selection(&["card_last4", "issuer", "due_date", "customer_name"]),
        );

        assert_eq!(parsed.get(FieldSpec::CardLast4), Some("1234"));
        assert_eq!(parsed.get(FieldSpec::Issuer), None);
        assert_eq!(parsed.get(FieldSpec::DueDate), None);
        assert_eq!(parsed.get(FieldSpec::CustomerName), Some("true"));
    }

    #[test]
    fn test_labelled_lines() {
        let response = "\
- **Issuer**: ICICI Bank
* Card Holder Name = Ms. Anita Rao
1. Payment Due Date -> 20/11/2024
| Total Amount Due | Rs. 4,500.00 |
Billing Cycle From: N/A";
        let parsed = ResponseParser::new().parse(response, &FieldSelection::all());

        assert!(!parsed.unstructured);
        assert_eq!(parsed.get(FieldSpec::Issuer), Some("ICICI Bank"));
        assert_eq!(parsed.get(FieldSpec::CustomerName), Some("Ms. Anita Rao"));
        assert_eq!(parsed.get(FieldSpec::DueDate), Some("20/11/2024"));
        assert_eq!(parsed.get(FieldSpec::TotalAmountDue), Some("Rs. 4,500.00"));
        assert_eq!(parsed.get(FieldSpec::BillingCycleFrom), None);
    }

    #[test]
    fn test_lines_fill_fields_missing_from_json() {
        let response = "{\"issuer\": \"SBI Card\"}\nDue date: 01-12-2024";
        let parsed = ResponseParser::new().parse(response, &selection(&["issuer", "due_date"]));

        assert_eq!(parsed.get(FieldSpec::Issuer), Some("SBI Card"));
        assert_eq!(parsed.get(FieldSpec::DueDate), Some("01-12-2024"));
    }

    #[test]
    fn test_unrequested_fields_are_ignored() {
        let response = r#"{"issuer": "HDFC Bank", "due_date": "05-11-2024"}"#;
        let parsed = ResponseParser::new().parse(response, &selection(&["issuer"]));

        assert_eq!(parsed.values.len(), 1);
        assert_eq!(parsed.get(FieldSpec::DueDate), None);
    }

    #[test]
    fn test_unstructured_response() {
        let response = "I'm sorry, the statement text is unreadable.";
        let parsed = ResponseParser::new().parse(response, &FieldSelection::all());

        assert!(parsed.unstructured);
        assert_eq!(parsed.found_count(), 0);
        assert_eq!(parsed.values.len(), FieldSpec::ALL.len());
    }

    #[test]
    fn test_python_style_dict() {
        let response = "{'issuer': 'HDFC Bank', 'customer_name': 'Mr. Rupal Patel', 'due_date': None}";
        let parsed = ResponseParser::new().parse(
            response,
            &selection(&["issuer", "customer_name", "due_date"]),
        );

        assert!(!parsed.unstructured);
        assert_eq!(parsed.get(FieldSpec::Issuer), Some("HDFC Bank"));
        assert_eq!(parsed.get(FieldSpec::CustomerName), Some("Mr. Rupal Patel"));
        assert_eq!(parsed.get(FieldSpec::DueDate), None);
    }

    #[test]
    fn test_trailing_comma_json() {
        let response = r#"{"issuer": "HDFC Bank", "due_date": "05-11-2024",}"#;
        let parsed = ResponseParser::new().parse(response, &selection(&["issuer", "due_date"]));

        assert_eq!(parsed.get(FieldSpec::Issuer), Some("HDFC Bank"));
        assert_eq!(parsed.get(FieldSpec::DueDate), Some("05-11-2024"));
    }

    #[test]
    fn test_repair_keeps_quotes_inside_values() {
        let response = r#"{"customer_name": "Mr. D'Souza", 'issuer': 'The "Axis" Bank',}"#;
        let parsed = ResponseParser::new().parse(response, &selection(&["customer_name", "issuer"]));

        assert_eq!(parsed.get(FieldSpec::CustomerName), Some("Mr. D'Souza"));
        assert_eq!(parsed.get(FieldSpec::Issuer), Some("The \"Axis\" Bank"));
    }

    #[test]
    fn test_array_value_is_not_read_back_from_lines() {
        let response = "{\n  \"issuer\": \"HDFC Bank\",\n  \"due_date\": [\n    \"05-11-2024\"\n  ]\n}";
        let parsed = ResponseParser::new().parse(response, &selection(&["issuer", "due_date"]));

        assert_eq!(parsed.get(FieldSpec::Issuer), Some("HDFC Bank"));
        assert_eq!(parsed.values[&FieldSpec::DueDate], None);
    }

    #[test]
    fn test_identifier_key_beats_alias_key() {
        for response in [
            r#"{"issuer": "HDFC Bank", "bank": "Visa"}"#,
            r#"{"bank": "Visa", "issuer": "HDFC Bank"}"#,
        ] {
            let parsed = ResponseParser::new().parse(response, &selection(&["issuer"]));
            assert_eq!(parsed.get(FieldSpec::Issuer), Some("HDFC Bank"), "{}", response);
        }
    }

    #[test]
    fn test_not_found_markers() {
        for marker in ["NOT_FOUND", "not found", "N/A", "null", "None", "unknown", "-", "", " \"NOT_FOUND\" "] {
            assert!(is_not_found(marker), "{:?}", marker);
        }
        assert!(!is_not_found("HDFC Bank"));
        assert!(!is_not_found("0"));
    }
}
