//! Value rules used by the normalizer.

pub mod amounts;
pub mod dates;
pub mod patterns;

pub use amounts::{parse_amount, strip_currency};
pub use dates::parse_date;
