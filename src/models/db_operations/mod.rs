use chrono::{DateTime, SecondsFormat, Utc};

pub mod comments_db_operations;
pub mod notifications_db_operations;
pub mod onboarding_db_operations;
pub mod posts_db_operations;
pub mod terms_db_operations;
pub mod users_db_operations;

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}
