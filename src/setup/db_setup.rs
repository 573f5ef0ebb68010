use crate::models::db_operations::posts_db_operations::{POSTS, SCHEDULE_INDEX};
use redb::{CommitError, Database, StorageError, TableError, TransactionError};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
}

const PORTAL_SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT,
            role TEXT NOT NULL CHECK(role IN ('internal_admin', 'internal_staff', 'client_owner', 'client_user')),
            organization_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            force_password_change INTEGER NOT NULL DEFAULT 0,
            last_login_time TEXT
        )",
    ),
    (
        "access_tokens",
        "CREATE TABLE IF NOT EXISTS access_tokens (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "notifications",
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT,
            origin TEXT,
            organization_id TEXT,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "notification_reads",
        "CREATE TABLE IF NOT EXISTS notification_reads (
            notification_id TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            read_at TEXT NOT NULL,
            PRIMARY KEY (notification_id, user_id),
            FOREIGN KEY (notification_id) REFERENCES notifications(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "onboarding_steps",
        "CREATE TABLE IF NOT EXISTS onboarding_steps (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL
        )",
    ),
    (
        "onboarding_tasks",
        "CREATE TABLE IF NOT EXISTS onboarding_tasks (
            id TEXT PRIMARY KEY,
            step_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'review', 'done')),
            due_date TEXT,
            FOREIGN KEY (step_id) REFERENCES onboarding_steps(id) ON DELETE CASCADE
        )",
    ),
    (
        "client_invites",
        "CREATE TABLE IF NOT EXISTS client_invites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_username TEXT NOT NULL,
            target_role TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            target_user_id INTEGER,
            status TEXT NOT NULL CHECK(status IN ('success', 'exists', 'error')),
            result TEXT NOT NULL,
            created_by INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "post_comments",
        "CREATE TABLE IF NOT EXISTS post_comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            organization_id TEXT,
            user_id INTEGER,
            author TEXT,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
        )",
    ),
    (
        "terms",
        "CREATE TABLE IF NOT EXISTS terms (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            version INTEGER NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "term_signatures",
        "CREATE TABLE IF NOT EXISTS term_signatures (
            id TEXT PRIMARY KEY,
            term_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            user_name TEXT,
            ip TEXT,
            user_agent TEXT,
            signed_at TEXT NOT NULL,
            UNIQUE (term_id, organization_id, user_id),
            FOREIGN KEY (term_id) REFERENCES terms(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
];

pub fn setup_portal_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    for (name, ddl) in PORTAL_SCHEMA {
        println!("- Creating '{}' table...", name);
        tx.execute(ddl, [])?;
    }
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_org ON notifications (organization_id, created_at)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_onboarding_tasks_org ON onboarding_tasks (organization_id)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_post_comments_post ON post_comments (post_id, created_at)",
        [],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn setup_posts_db(db: &Database) -> Result<(), SetupError> {
    let write_txn = db.begin_write()?;
    {
        println!("- Creating 'posts' table in Redb...");
        write_txn.open_table(POSTS)?;

        println!("- Creating 'schedule_index' table in Redb...");
        write_txn.open_table(SCHEDULE_INDEX)?;
    }
    write_txn.commit()?;
    Ok(())
}
