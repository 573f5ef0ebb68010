use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod filter;
pub mod pagination;
pub mod transitions;

pub use filter::{
    filter_posts, sort_by_schedule, status_summary, CalendarQuery, FilterOptions, StatusFilter,
    StatusSummary,
};
pub use pagination::{paginate, PageRequest, PagedFeed};
pub use transitions::{
    allowed_transitions_by_role, authorize_transition, can_transition, offered_transitions,
    PostStatus, TransitionMap, TransitionRejection,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid post status: '{0}'")]
    InvalidStatus(String),
    #[error("Invalid schedule window: 'from' ({from}) is after 'to' ({to})")]
    InvalidWindow { from: DateTime<Utc>, to: DateTime<Utc> },
    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),
}
