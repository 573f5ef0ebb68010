use clap::{Parser, Subcommand};
use portal_backend::config::Config;
use portal_backend::models::db_operations::users_db_operations::{self, NewUser};
use portal_backend::permissions::UserRole;
use portal_backend::setup::db_setup;
use redb::Database;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial portal setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the `posts` and/or `portal` databases.
    Setup { db_type: Option<String> },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// internal_admin, internal_staff, client_owner or client_user.
        #[arg(long)]
        role: UserRole,
        #[arg(long)]
        organization: Option<String>,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup { db_type } => match db_type.as_deref() {
                Some("portal") => setup_portal_database(&config),
                Some("posts") => setup_posts_database(&config),
                Some(other) => eprintln!("❌ Error: Unknown database type '{}'. Use 'portal' or 'posts'.", other),
                None => {
                    setup_portal_database(&config);
                    setup_posts_database(&config);
                }
            },
        },
        Commands::User { action } => match action {
            UserAction::Create { username, password, role, organization } => {
                create_user(&config, username, password, *role, organization.as_deref());
            }
            UserAction::List => list_users(&config),
        },
    }
}

fn setup_portal_database(config: &Config) {
    let db_path = config.portal_db_path();
    if db_path.exists() {
        println!("ℹ️ Portal database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up portal database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create portal database file.");
    match db_setup::setup_portal_db(&mut conn) {
        Ok(_) => println!("✅ Portal database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up portal database: {}", e),
    }
}

fn setup_posts_database(config: &Config) {
    let db_path = config.posts_db_path();
    if db_path.exists() {
        println!("ℹ️ Posts database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up posts database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let db = Database::create(&db_path).expect("Failed to create posts database file.");
    match db_setup::setup_posts_db(&db) {
        Ok(_) => println!("✅ Posts database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up posts database: {}", e),
    }
}

fn open_portal(config: &Config) -> Option<Connection> {
    let db_path = config.portal_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Portal database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening portal database: {}", e);
            None
        }
    }
}

fn create_user(config: &Config, username: &str, password: &str, role: UserRole, organization: Option<&str>) {
    if role.is_client() && organization.is_none() {
        eprintln!("❌ Error: Client users need an --organization.");
        return;
    }
    let Some(conn) = open_portal(config) else { return };
    let new_user = NewUser {
        username,
        password,
        name: None,
        role,
        organization_id: organization,
        force_password_change: role.is_client(),
    };
    match users_db_operations::create_user(&conn, &new_user) {
        Ok(id) => println!("✅ User '{}' ({}) created with id {}.", username, role, id),
        Err(e) => eprintln!("❌ Error creating user: {}. It might be because the username already exists.", e),
    }
}

fn list_users(config: &Config) {
    let Some(conn) = open_portal(config) else { return };
    println!("Listing portal users:");
    match users_db_operations::read_all_users(&conn) {
        Ok(users) => {
            for user in users {
                println!(
                    "- {} [{}] org={} active={}",
                    user.username,
                    user.role,
                    user.organization_id.as_deref().unwrap_or("-"),
                    user.is_active
                );
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}
