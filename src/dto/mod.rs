use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod common;
#[cfg(feature = "sports-feed")]
pub mod feed;
pub mod health;
pub mod host;
pub mod patron;
pub mod validation;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

pub(crate) fn format_optional_time(time: Option<SystemTime>) -> Option<String> {
    time.map(format_system_time)
}
