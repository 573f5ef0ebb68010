use crate::calendar::PostStatus;
use crate::models::{NewPost, Post};
use chrono::Utc;
use redb::{
    CommitError, Database, ReadableTable, StorageError, Table, TableDefinition, TableError,
    TransactionError,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),
    #[error("Item not found in database: {0}")]
    NotFound(String),
}

pub const POSTS: TableDefinition<&[u8; 16], &str> = TableDefinition::new("posts");
/// Calendar ordering: (scheduled millis or `i64::MAX`, post id).
pub const SCHEDULE_INDEX: TableDefinition<(i64, &[u8; 16]), ()> = TableDefinition::new("schedule_index");

/// Unscheduled posts sort after every real timestamp.
pub fn schedule_key(post: &Post) -> i64 {
    post.scheduled_at.map_or(i64::MAX, |at| at.timestamp_millis())
}

fn build_post(new_post: NewPost, actor: Option<&str>) -> (Uuid, Post) {
    let post_uuid = Uuid::new_v4();
    let mut post = Post {
        id: post_uuid.to_string(),
        organization_id: new_post.organization_id,
        title: new_post.title,
        channel: new_post.channel,
        status: PostStatus::Draft,
        scheduled_at: new_post.scheduled_at,
        media_path: None,
        caption: None,
        topic: new_post.topic,
        script: new_post.script,
        raw_video_path: None,
        edited_video_path: None,
        notes: new_post.notes,
        week_number: None,
        weekday: None,
        reference_links: None,
        created_at: Utc::now(),
        updated_at: None,
        updated_by: actor.map(str::to_string),
        archived_at: None,
        archive_location: None,
    };
    post.refresh_schedule_metadata();
    (post_uuid, post)
}

fn write_post(
    posts_table: &mut Table<'_, '_, &'static [u8; 16], &'static str>,
    schedule_index: &mut Table<'_, '_, (i64, &'static [u8; 16]), ()>,
    id_bytes: &[u8; 16],
    post: &Post,
) -> Result<(), DbError> {
    let json = serde_json::to_string(post)?;
    posts_table.insert(id_bytes, json.as_str())?;
    schedule_index.insert((schedule_key(post), id_bytes), ())?;
    Ok(())
}

/// Creates a post in `draft`.
pub fn create_post(db: &Database, new_post: NewPost, actor: Option<&str>) -> Result<Post, DbError> {
    let mut created = create_posts(db, vec![new_post], actor)?;
    created
        .pop()
        .ok_or_else(|| DbError::NotFound("created post".to_string()))
}

/// Creates every post in a single transaction. Either all are stored or none.
pub fn create_posts(
    db: &Database,
    new_posts: Vec<NewPost>,
    actor: Option<&str>,
) -> Result<Vec<Post>, DbError> {
    let mut created = Vec::with_capacity(new_posts.len());
    let write_txn = db.begin_write()?;
    {
        let mut posts_table = write_txn.open_table(POSTS)?;
        let mut schedule_index = write_txn.open_table(SCHEDULE_INDEX)?;
        for new_post in new_posts {
            let (post_uuid, post) = build_post(new_post, actor);
            write_post(&mut posts_table, &mut schedule_index, &post_uuid.into_bytes(), &post)?;
            created.push(post);
        }
    }
    write_txn.commit()?;
    Ok(created)
}

pub fn read_post(db: &Database, post_id: &str) -> Result<Post, DbError> {
    let id_bytes = Uuid::parse_str(post_id)?.into_bytes();
    let read_txn = db.begin_read()?;
    let posts_table = read_txn.open_table(POSTS)?;
    let guard = posts_table
        .get(&id_bytes)?
        .ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
    Ok(serde_json::from_str(guard.value())?)
}

/// Posts in calendar order: ascending schedule, unscheduled last, ties by id.
///
/// `organization` of `None` lists every organization.
pub fn list_posts(db: &Database, organization: Option<&str>) -> Result<Vec<Post>, DbError> {
    let read_txn = db.begin_read()?;
    let posts_table = read_txn.open_table(POSTS)?;
    let schedule_index = read_txn.open_table(SCHEDULE_INDEX)?;

    let mut posts = Vec::new();
    for entry in schedule_index.iter()? {
        let (key, _) = entry?;
        let (_, id_bytes) = key.value();
        let Some(guard) = posts_table.get(id_bytes)? else {
            log::warn!("Schedule index points at missing post {}", Uuid::from_bytes(*id_bytes));
            continue;
        };
        let post: Post = serde_json::from_str(guard.value())?;
        let in_scope = match organization {
            None => true,
            Some(org) => post.organization_id.as_deref() == Some(org),
        };
        if in_scope {
            posts.push(post);
        }
    }
    Ok(posts)
}

/// Reads, mutates and writes back one post inside a single write
/// transaction. Returning `Err` from `mutate` aborts without writing.
pub fn modify_post<F, E>(db: &Database, post_id: &str, mutate: F) -> Result<Post, E>
where
    F: FnOnce(&mut Post) -> Result<(), E>,
    E: From<DbError>,
{
    let id_bytes = Uuid::parse_str(post_id).map_err(DbError::from)?.into_bytes();
    let write_txn = db.begin_write().map_err(DbError::from)?;
    let post = {
        let mut posts_table = write_txn.open_table(POSTS).map_err(DbError::from)?;
        let mut schedule_index = write_txn.open_table(SCHEDULE_INDEX).map_err(DbError::from)?;

        let mut post: Post = {
            let guard = posts_table
                .get(&id_bytes)
                .map_err(DbError::from)?
                .ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
            serde_json::from_str(guard.value()).map_err(DbError::from)?
        };
        let old_key = schedule_key(&post);

        mutate(&mut post)?;
        post.refresh_schedule_metadata();

        schedule_index
            .remove((old_key, &id_bytes))
            .map_err(DbError::from)?;
        write_post(&mut posts_table, &mut schedule_index, &id_bytes, &post)?;
        post
    };
    write_txn.commit().map_err(DbError::from)?;
    Ok(post)
}

/// Flips the archive flag; `archived_at` and `archive_location` move together.
pub fn toggle_archive(db: &Database, post_id: &str, actor: Option<&str>) -> Result<Post, DbError> {
    modify_post(db, post_id, |post| {
        if post.is_archived() {
            post.archived_at = None;
            post.archive_location = None;
        } else {
            post.archived_at = Some(Utc::now());
            post.archive_location = Some("manual".to_string());
        }
        post.updated_at = Some(Utc::now());
        post.updated_by = actor.map(str::to_string);
        Ok::<(), DbError>(())
    })
}

pub fn delete_post(db: &Database, post_id: &str) -> Result<Post, DbError> {
    let id_bytes = Uuid::parse_str(post_id)?.into_bytes();
    let write_txn = db.begin_write()?;
    let post = {
        let mut posts_table = write_txn.open_table(POSTS)?;
        let mut schedule_index = write_txn.open_table(SCHEDULE_INDEX)?;
        let post: Post = {
            let guard = posts_table
                .remove(&id_bytes)?
                .ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
            serde_json::from_str(guard.value())?
        };
        schedule_index.remove((schedule_key(&post), &id_bytes))?;
        post
    };
    write_txn.commit()?;
    Ok(post)
}
