//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::ServerConfig;
use crate::config::{AuthConfig, MIN_SECRET_LENGTH, parse_algorithm};
use crate::db::{Database, UserRole};
use crate::password::spawn_hash;
use crate::store::{CredentialStore, MemoryStore, RedisStore};
use clap::Parser;
use jsonwebtoken::Algorithm;
use tracing::{error, info, warn};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "moviegate", about = "Movie lists behind rotating session credentials")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "moviegate.db")]
    pub database: String,

    /// Redis URL for the credential store. Without it, sessions live in process memory
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix for every Redis key
    #[arg(long, default_value = "moviegate:")]
    pub redis_prefix: String,

    /// Path to file containing the signing secret. Prefer the JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the refresh key secret. Prefer the REFRESH_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Signing algorithm (HS256, HS384 or HS512)
    #[arg(long, default_value = "HS256", value_parser = parse_algorithm_arg)]
    pub algorithm: Algorithm,

    /// Access credential lifetime in seconds
    #[arg(long, default_value = "43200")]
    pub access_ttl: u64,

    /// Refresh credential lifetime in seconds
    #[arg(long, default_value = "604800")]
    pub refresh_ttl: u64,

    /// Path pattern requiring the admin role (repeatable)
    #[arg(long = "admin-path", default_values_t = [crate::config::DEFAULT_ADMIN_PATH.to_string()])]
    pub admin_paths: Vec<String>,

    /// Set the Secure flag on cookies (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Login and register attempts per client IP per minute
    #[arg(long, default_value = "10")]
    pub login_per_minute: NonZeroU32,

    /// Create an admin with this username on startup. Password from ADMIN_PASSWORD
    #[arg(long)]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_algorithm_arg(s: &str) -> Result<Algorithm, String> {
    parse_algorithm(s).map_err(|e| e.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
///
/// Call before the async runtime starts: the variable is removed from the
/// environment, which is only sound while the process has a single thread.
pub fn load_secret(env_var: &str, file: Option<&str>, flag: &str) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: `main` calls this before building the runtime, so no other
        // thread exists that could read the environment concurrently.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use {}",
            env_var, flag
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build the auth configuration from validated arguments.
pub fn build_auth_config(args: &Args, jwt_secret: String, refresh_secret: String) -> AuthConfig {
    AuthConfig {
        jwt_secret: jwt_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        algorithm: args.algorithm,
        access_ttl: Duration::from_secs(args.access_ttl),
        refresh_ttl: Duration::from_secs(args.refresh_ttl),
        admin_paths: args.admin_paths.clone(),
        secure_cookies: args.secure_cookies,
    }
}

/// Build ServerConfig from validated parts.
pub fn build_config(
    db: Database,
    store: Arc<dyn CredentialStore>,
    auth: AuthConfig,
    login_per_minute: NonZeroU32,
) -> ServerConfig {
    ServerConfig {
        db,
        store,
        auth,
        login_per_minute,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Connect the credential store: Redis when a URL is given, process memory otherwise.
pub async fn open_store(redis_url: Option<&str>, prefix: &str) -> Option<Arc<dyn CredentialStore>> {
    match redis_url {
        Some(url) => match RedisStore::connect(url, prefix).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis");
                None
            }
        },
        None => {
            warn!("No Redis URL configured; sessions are kept in memory and lost on restart");
            Some(Arc::new(MemoryStore::new()))
        }
    }
}

/// Read and clear ADMIN_PASSWORD. Same threading rule as [`load_secret`].
pub fn take_admin_password() -> Option<String> {
    let Ok(password) = std::env::var("ADMIN_PASSWORD") else {
        error!("ADMIN_PASSWORD must be set when using --create-admin");
        return None;
    };
    // SAFETY: called from `main` before the runtime exists.
    unsafe { std::env::remove_var("ADMIN_PASSWORD") };
    Some(password)
}

/// Handle the --create-admin flag: create the admin unless the name is taken.
pub async fn handle_create_admin(db: &Database, username: &str, password: String) {
    match db.users().find_by_username(username).await {
        Ok(Some(existing)) => {
            info!(
                username = %existing.username,
                role = existing.role.as_str(),
                "User already exists, not creating admin"
            );
        }
        Ok(None) => {
            let hashed = match spawn_hash(password).await {
                Ok(hashed) => hashed,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };
            match db.users().create(username, &hashed, UserRole::Admin).await {
                Ok(id) => info!(user_id = id, username = %username, "Admin user created"),
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }
}
