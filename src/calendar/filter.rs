use crate::calendar::{CalendarError, PostStatus};
use crate::models::Post;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PostStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: PostStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(s) => s.fmt(f),
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for StatusFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The reusable visibility criteria. All supplied criteria must hold.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub status: StatusFilter,
    pub channel: Option<String>,
    pub include_archived: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl FilterOptions {
    pub fn matches(&self, post: &Post) -> bool {
        if !self.include_archived && post.is_archived() {
            return false;
        }
        if !self.status.matches(post.status) {
            return false;
        }
        if let Some(channel) = self.channel.as_deref().filter(|c| !c.is_empty()) {
            if post.channel.as_deref() != Some(channel) {
                return false;
            }
        }
        // Unscheduled posts are never excluded by a date bound.
        if let Some(at) = post.scheduled_at {
            if self.from.map_or(false, |from| at < from) {
                return false;
            }
            if self.to.map_or(false, |to| at > to) {
                return false;
            }
        }
        true
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(CalendarError::InvalidWindow { from, to }),
            _ => Ok(()),
        }
    }
}

/// Order-preserving subsequence of `posts` matching `options`.
pub fn filter_posts<'a, I>(posts: I, options: &FilterOptions) -> Vec<&'a Post>
where
    I: IntoIterator<Item = &'a Post>,
{
    posts.into_iter().filter(|p| options.matches(p)).collect()
}

/// Calendar view refinements layered over [`FilterOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalendarQuery {
    #[serde(flatten)]
    pub filter: FilterOptions,
    pub week: Option<u32>,
    pub topic: Option<String>,
}

impl CalendarQuery {
    pub fn matches(&self, post: &Post) -> bool {
        if !self.filter.matches(post) {
            return false;
        }
        if let Some(week) = self.week.filter(|w| *w > 0) {
            if post.week_number != Some(week) {
                return false;
            }
        }
        if let Some(needle) = self.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = needle.to_lowercase();
            let in_topic = post
                .topic
                .as_deref()
                .map_or(false, |t| t.to_lowercase().contains(&needle));
            let in_title = post.title.to_lowercase().contains(&needle);
            if !in_topic && !in_title {
                return false;
            }
        }
        true
    }

    pub fn apply<'a, I>(&self, posts: I) -> Vec<&'a Post>
    where
        I: IntoIterator<Item = &'a Post>,
    {
        posts.into_iter().filter(|p| self.matches(p)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub draft: usize,
    pub raw_uploaded: usize,
    pub editing: usize,
    pub approved: usize,
    pub published: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.draft + self.raw_uploaded + self.editing + self.approved + self.published
    }
}

pub fn status_summary<'a, I>(posts: I) -> StatusSummary
where
    I: IntoIterator<Item = &'a Post>,
{
    posts.into_iter().fold(StatusSummary::default(), |mut acc, post| {
        match post.status {
            PostStatus::Draft => acc.draft += 1,
            PostStatus::RawUploaded => acc.raw_uploaded += 1,
            PostStatus::Editing => acc.editing += 1,
            PostStatus::Approved => acc.approved += 1,
            PostStatus::Published => acc.published += 1,
        }
        acc
    })
}

/// Unscheduled sorts after every scheduled timestamp.
pub fn compare_schedule(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable ascending sort by `scheduled_at`, unscheduled posts last.
pub fn sort_by_schedule(posts: &mut [Post]) {
    posts.sort_by(|a, b| compare_schedule(a.scheduled_at, b.scheduled_at));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    pub(crate) fn post(id: &str, status: PostStatus, channel: &str, day: Option<u32>) -> Post {
        let scheduled_at = day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap());
        let mut p = Post {
            id: id.to_string(),
            organization_id: Some("org-1".to_string()),
            title: format!("Post {id}"),
            channel: Some(channel.to_string()),
            status,
            scheduled_at,
            media_path: None,
            caption: None,
            topic: None,
            script: None,
            raw_video_path: None,
            edited_video_path: None,
            notes: None,
            week_number: None,
            weekday: None,
            reference_links: None,
            created_at: Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            updated_by: None,
            archived_at: None,
            archive_location: None,
        };
        p.refresh_schedule_metadata();
        p
    }

    fn fixture() -> Vec<Post> {
        let mut archived = post("3", PostStatus::Published, "ig", Some(3));
        archived.archived_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        archived.archive_location = Some("manual".to_string());
        vec![
            post("1", PostStatus::Draft, "ig", Some(1)),
            post("2", PostStatus::Approved, "li", Some(2)),
            archived,
        ]
    }

    fn ids(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn filters_by_status_and_channel() {
        let posts = fixture();
        let opts = FilterOptions {
            status: StatusFilter::Only(PostStatus::Approved),
            channel: Some("li".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_posts(&posts, &opts)), vec!["2"]);
    }

    #[test]
    fn archived_excluded_unless_flagged() {
        let posts = fixture();
        let mut opts = FilterOptions::default();
        assert_eq!(filter_posts(&posts, &opts).len(), 2);
        opts.include_archived = true;
        assert_eq!(filter_posts(&posts, &opts).len(), 3);
    }

    #[test]
    fn archived_stays_hidden_even_when_other_criteria_match() {
        let posts = fixture();
        let opts = FilterOptions {
            status: StatusFilter::Only(PostStatus::Published),
            channel: Some("ig".to_string()),
            ..Default::default()
        };
        assert!(filter_posts(&posts, &opts).is_empty());
    }

    #[test]
    fn channel_is_exact_and_case_sensitive() {
        let posts = fixture();
        let opts = FilterOptions { channel: Some("I".to_string()), ..Default::default() };
        assert!(filter_posts(&posts, &opts).is_empty());
        let opts = FilterOptions { channel: Some("IG".to_string()), ..Default::default() };
        assert!(filter_posts(&posts, &opts).is_empty());
        let opts = FilterOptions { channel: Some(String::new()), ..Default::default() };
        assert_eq!(filter_posts(&posts, &opts).len(), 2);
    }

    #[test]
    fn date_window_is_inclusive_and_ignores_unscheduled() {
        let mut posts = fixture();
        posts.push(post("4", PostStatus::Draft, "ig", None));
        let opts = FilterOptions {
            from: Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_posts(&posts, &opts)), vec!["2", "4"]);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let opts = FilterOptions {
            from: Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(CalendarError::InvalidWindow { .. })));
    }

    #[test]
    fn calendar_query_matches_week_and_topic() {
        let mut posts = fixture();
        posts[0].topic = Some("Lançamento de Produto".to_string());
        let query = CalendarQuery { topic: Some("produto".to_string()), ..Default::default() };
        assert_eq!(ids(&query.apply(&posts)), vec!["1"]);

        let query = CalendarQuery { topic: Some("post 2".to_string()), ..Default::default() };
        assert_eq!(ids(&query.apply(&posts)), vec!["2"]);

        let query = CalendarQuery { week: posts[1].week_number, ..Default::default() };
        assert_eq!(query.apply(&posts).len(), 2);

        let query = CalendarQuery { week: Some(40), ..Default::default() };
        assert!(query.apply(&posts).is_empty());
    }

    #[test]
    fn status_filter_parses_all_and_literals() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "editing".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(PostStatus::Editing)
        );
        assert!("everything".parse::<StatusFilter>().is_err());
        let opts: FilterOptions = serde_json::from_str(r#"{"status":"approved","include_archived":true}"#).unwrap();
        assert_eq!(opts.status, StatusFilter::Only(PostStatus::Approved));
        assert!(serde_json::from_str::<FilterOptions>(r#"{"status":"bogus"}"#).is_err());
    }

    #[test]
    fn summary_counts_each_status() {
        let posts = fixture();
        let summary = status_summary(&posts);
        assert_eq!(summary.draft, 1);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn unscheduled_posts_sort_last() {
        let mut posts = vec![
            post("late", PostStatus::Draft, "ig", None),
            post("b", PostStatus::Draft, "ig", Some(9)),
            post("a", PostStatus::Draft, "ig", Some(2)),
            post("later", PostStatus::Draft, "ig", None),
        ];
        sort_by_schedule(&mut posts);
        let order: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "late", "later"]);
    }

    fn arb_post() -> impl Strategy<Value = Post> {
        (
            0u32..1000,
            prop::sample::select(PostStatus::ALL.to_vec()),
            prop::sample::select(vec!["ig", "li", "tt"]),
            prop::option::of(1u32..28),
            any::<bool>(),
        )
            .prop_map(|(n, status, channel, day, archived)| {
                let mut p = post(&n.to_string(), status, channel, day);
                if archived {
                    p.archived_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
                }
                p
            })
    }

    fn arb_options() -> impl Strategy<Value = FilterOptions> {
        (
            prop::option::of(prop::sample::select(PostStatus::ALL.to_vec())),
            prop::option::of(prop::sample::select(vec!["ig", "li", ""])),
            any::<bool>(),
            prop::option::of(1u32..28),
            prop::option::of(1u32..28),
        )
            .prop_map(|(status, channel, include_archived, from, to)| FilterOptions {
                status: status.map_or(StatusFilter::All, StatusFilter::Only),
                channel: channel.map(str::to_string),
                include_archived,
                from: from.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()),
                to: to.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 23, 0, 0).unwrap()),
            })
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent(posts in prop::collection::vec(arb_post(), 0..40), opts in arb_options()) {
            let once: Vec<Post> = filter_posts(&posts, &opts).into_iter().cloned().collect();
            let twice: Vec<Post> = filter_posts(&once, &opts).into_iter().cloned().collect();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn filtering_preserves_input_order(posts in prop::collection::vec(arb_post(), 0..40), opts in arb_options()) {
            let kept = filter_posts(&posts, &opts);
            let positions: Vec<usize> = kept
                .iter()
                .map(|k| posts.iter().position(|p| std::ptr::eq(p, *k)).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn criteria_compose_conjunctively(posts in prop::collection::vec(arb_post(), 0..40), opts in arb_options()) {
            let status_only = FilterOptions { status: opts.status, include_archived: true, ..Default::default() };
            let rest = FilterOptions { status: StatusFilter::All, ..opts.clone() };
            let staged: Vec<Post> = filter_posts(&posts, &status_only).into_iter().cloned().collect();
            let staged: Vec<String> = filter_posts(&staged, &rest).iter().map(|p| p.id.clone()).collect();
            let direct: Vec<String> = filter_posts(&posts, &opts).iter().map(|p| p.id.clone()).collect();
            prop_assert_eq!(staged, direct);
        }
    }
}
