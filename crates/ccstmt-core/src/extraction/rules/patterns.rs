//! Common regex patterns for statement value normalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Currency markers, leading or trailing
    pub static ref CURRENCY_PREFIX: Regex = Regex::new(
        r"(?i)^(?:₹|rs\.?|inr|\$|usd|€|eur|£|gbp)\s*"
    ).unwrap();

    pub static ref CURRENCY_SUFFIX: Regex = Regex::new(
        r"(?i)\s*(?:₹|rs\.?|inr|\$|usd|€|eur|£|gbp)$"
    ).unwrap();

    // Amount shapes (after currency stripping, optional sign)
    pub static ref AMOUNT_PLAIN: Regex = Regex::new(
        r"^\d+(?:[.,]\d{1,2})?$"
    ).unwrap();

    pub static ref AMOUNT_WESTERN: Regex = Regex::new(
        r"^\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?$"
    ).unwrap();

    pub static ref AMOUNT_INDIAN: Regex = Regex::new(
        r"^\d{1,2}(?:,\d{2})*,\d{3}(?:\.\d{1,2})?$"
    ).unwrap();

    pub static ref AMOUNT_EUROPEAN: Regex = Regex::new(
        r"^\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?$"
    ).unwrap();

    pub static ref AMOUNT_SPACED: Regex = Regex::new(
        r"^\d{1,3}(?:[ \u{00a0}]\d{3})+(?:[.,]\d{1,2})?$"
    ).unwrap();

    // Whole-value date shapes
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})$"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})$"
    ).unwrap();

    pub static ref DATE_DAY_MONTH_NAME: Regex = Regex::new(
        r"(?i)^(\d{1,2})(?:st|nd|rd|th)?[\s\-/.,]+([a-z]{3,9})\.?[\s\-/.,]+(\d{4}|\d{2})$"
    ).unwrap();

    pub static ref DATE_MONTH_NAME_DAY: Regex = Regex::new(
        r"(?i)^([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$"
    ).unwrap();

    // Response line structure
    pub static ref LIST_MARKER: Regex = Regex::new(
        r"^(?:[-*•>#]+|\d{1,2}[.)])\s+"
    ).unwrap();

    pub static ref CODE_FENCE: Regex = Regex::new(
        r"(?m)^\s*```[a-zA-Z]*\s*$"
    ).unwrap();

    pub static ref WHITESPACE_RUN: Regex = Regex::new(
        r"\s+"
    ).unwrap();
}
