//! Amount parsing for statement totals.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{
    AMOUNT_EUROPEAN, AMOUNT_INDIAN, AMOUNT_PLAIN, AMOUNT_SPACED, AMOUNT_WESTERN, CURRENCY_PREFIX,
    CURRENCY_SUFFIX,
};

/// Remove one leading and one trailing currency marker.
pub fn strip_currency(s: &str) -> &str {
    let s = s.trim();
    let s = CURRENCY_PREFIX.find(s).map_or(s, |m| &s[m.end()..]);
    let s = CURRENCY_SUFFIX.find(s).map_or(s, |m| &s[..m.start()]);
    s.trim()
}

/// Parse a statement amount such as "₹13,429.57", "Rs. 1,23,456.00" or "1.234,56 EUR".
///
/// Returns `None` unless the value is a single number once the currency
/// marker is gone, so "13,429.57 (min due 500)" is left alone.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let body = strip_currency(s);
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, strip_currency(rest)),
        None => (false, body),
    };

    let normalized = if AMOUNT_WESTERN.is_match(body) || AMOUNT_INDIAN.is_match(body) {
        body.replace(',', "")
    } else if AMOUNT_EUROPEAN.is_match(body) {
        body.replace('.', "").replace(',', ".")
    } else if AMOUNT_SPACED.is_match(body) {
        body.replace([' ', '\u{00a0}'], "").replace(',', ".")
    } else if AMOUNT_PLAIN.is_match(body) {
        body.replace(',', ".")
    } else {
        return None;
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -amount } else { amount })
}
