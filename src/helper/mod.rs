pub mod auth_helpers;
pub mod calendar_helpers;
pub mod csv_import;
pub mod notification_helpers;
pub mod onboarding_helpers;
pub mod sanitization_helpers;
pub mod storage_helpers;
pub mod terms_helpers;
