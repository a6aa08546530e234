//! Data models shared across the extraction pipeline.

pub mod config;
pub mod document;
pub mod field;
pub mod record;
