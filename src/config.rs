use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
const DEFAULT_WS_PORT: u16 = 8080;
const DEFAULT_HTTP_PORT: u16 = 8081;

// Default database pool settings
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_IDLE_TIMEOUT_SECS: u64 = 600;

// Default access token TTL (hours)
const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 24;

/// Upper bound for message content, in characters after trimming.
/// Larger payloads (media) go through the file subsystem and arrive here as
/// attachment references only.
pub const MAX_MESSAGE_CONTENT_CHARS: usize = 16 * 1024;

/// Upper bound for attachment references on a single message.
pub const MAX_MESSAGE_ATTACHMENTS: usize = 32;

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// When false, user ids in logs are replaced by a salted hash.
    pub enable_user_identifiers: bool,
    pub hash_salt: String,
}

/// Database connection pool configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Messaging policy configuration
#[derive(Clone, Debug)]
pub struct MessagingConfig {
    /// Whether posting into a closed thread reopens it (moves it back to
    /// `replied`). When false the message is stored and the thread stays
    /// closed until an explicit status update.
    pub reopen_closed_on_message: bool,
    /// Subject label for threads created without a project.
    pub default_subject: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// WebSocket listener port
    pub ws_port: u16,
    /// HTTP API / health / metrics port
    pub http_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_hours: i64,
    pub logging: LoggingConfig,
    pub db: DbConfig,
    pub messaging: MessagingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: std::env::var("DATABASE_URL")?,
            ws_port: std::env::var("WS_PORT")
                .unwrap_or_default()
                .parse()
                .unwrap_or(DEFAULT_WS_PORT),
            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_default()
                .parse()
                .unwrap_or(DEFAULT_HTTP_PORT),
            jwt_secret: std::env::var("JWT_SECRET")?,
            jwt_issuer: std::env::var("JWT_ISSUER")
                .unwrap_or_else(|_| "atrium".to_string()),
            access_token_ttl_hours: std::env::var("ACCESS_TOKEN_TTL_HOURS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_HOURS),
            logging: LoggingConfig {
                enable_user_identifiers: std::env::var("LOG_USER_IDENTIFIERS")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                hash_salt: std::env::var("LOG_HASH_SALT")
                    .unwrap_or_else(|_| "atrium-log-salt".to_string()),
            },
            db: DbConfig {
                max_connections: std::env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_default()
                    .parse()
                    .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
                acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_default()
                    .parse()
                    .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                    .unwrap_or_default()
                    .parse()
                    .unwrap_or(DEFAULT_DB_IDLE_TIMEOUT_SECS),
            },
            messaging: MessagingConfig {
                reopen_closed_on_message: std::env::var("REOPEN_CLOSED_ON_MESSAGE")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                default_subject: std::env::var("DEFAULT_THREAD_SUBJECT")
                    .unwrap_or_else(|_| "New conversation".to_string()),
            },
        };

        if config.jwt_secret.trim().len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        Ok(config)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            reopen_closed_on_message: false,
            default_subject: "New conversation".to_string(),
        }
    }
}
