//! Date parsing for statement cycle and due dates.

use chrono::NaiveDate;

use super::patterns::{DATE_DAY_MONTH_NAME, DATE_DMY, DATE_MONTH_NAME_DAY, DATE_YMD};

/// Parse a whole value as a calendar date.
///
/// Numeric dates are read day first. `MM/DD/YYYY` is only assumed when the
/// first number cannot be a month day pair the other way round, i.e. the
/// second number exceeds 12.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Some(caps) = DATE_DMY.captures(s) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);

        return NaiveDate::from_ymd_opt(year, second, first).or_else(|| {
            if second > 12 {
                NaiveDate::from_ymd_opt(year, first, second)
            } else {
                None
            }
        });
    }

    if let Some(caps) = DATE_YMD.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // "15 Oct 2024", "15-Oct-24", "5th October, 2024"
    if let Some(caps) = DATE_DAY_MONTH_NAME.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_to_number(&caps[2])?;
        let year = parse_year(&caps[3]);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // "October 15, 2024"
    if let Some(caps) = DATE_MONTH_NAME_DAY.captures(s) {
        let month = month_to_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

/// English month name or abbreviation ("Sep", "Sept", "September") to number.
fn month_to_number(month: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];

    let month = month.to_lowercase();
    MONTHS
        .iter()
        .position(|full| month.len() >= 3 && full.starts_with(month.as_str()))
        .map(|i| i as u32 + 1)
}
