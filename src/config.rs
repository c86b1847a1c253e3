use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt};

/// Origin of the local frontend dev server; always allowed by CORS.
pub const LOCAL_DEV_ORIGIN: &str = "http://localhost:3000";

/// Where note payloads are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    S3 { bucket: String, region: String },
    Local { dir: String, public_base_url: String },
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
    pub jwt_secret: String,
    pub allowed_email_domain: String,
    pub allowed_origins: Vec<String>,
    pub frontend_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Rice Notes API server")]
pub struct Args {
    /// Host to bind to (overrides NOTES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Storage backend: s3, local or memory (overrides STORAGE_BACKEND)
    #[arg(long)]
    pub storage_backend: Option<String>,

    /// Apply the database schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values looked up with `env`. CLI wins.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let env_port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => 8080,
        };

        let storage = resolve_storage(args.storage_backend, &var)?;

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let google_client_id = var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?;
        let google_client_secret =
            var("GOOGLE_CLIENT_SECRET").context("GOOGLE_CLIENT_SECRET must be set")?;
        let google_redirect_url =
            var("GOOGLE_REDIRECT_URL").context("GOOGLE_REDIRECT_URL must be set")?;

        let mut allowed_origins = vec![LOCAL_DEV_ORIGIN.to_string()];
        if let Some(list) = var("ALLOWED_ORIGINS") {
            for origin in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let origin = origin.trim_end_matches('/').to_string();
                if !allowed_origins.contains(&origin) {
                    allowed_origins.push(origin);
                }
            }
        }

        Ok(Self {
            host: args
                .host
                .or_else(|| var("NOTES_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/notes.db".into()),
            storage,
            google_client_id,
            google_client_secret,
            google_redirect_url,
            jwt_secret,
            allowed_email_domain: var("ALLOWED_EMAIL_DOMAIN").unwrap_or_else(|| "rice.edu".into()),
            allowed_origins,
            frontend_url: var("FRONTEND_URL")
                .unwrap_or_else(|| LOCAL_DEV_ORIGIN.into())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `USE_MOCK_S3=true` forces the memory backend. An S3 backend without a
/// bucket falls back to memory so local runs work without AWS.
fn resolve_storage(
    cli_backend: Option<String>,
    var: &impl Fn(&str) -> Option<String>,
) -> Result<StorageConfig> {
    if var("USE_MOCK_S3").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return Ok(StorageConfig::Memory);
    }

    let backend = cli_backend
        .or_else(|| var("STORAGE_BACKEND"))
        .unwrap_or_else(|| "s3".into())
        .to_ascii_lowercase();

    match backend.as_str() {
        "s3" => match var("S3_BUCKET_NAME") {
            Some(bucket) => Ok(StorageConfig::S3 {
                bucket,
                region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            }),
            None => {
                tracing::warn!("S3_BUCKET_NAME not set, using in-memory storage for development");
                Ok(StorageConfig::Memory)
            }
        },
        "local" => Ok(StorageConfig::Local {
            dir: var("LOCAL_STORAGE_DIR").unwrap_or_else(|| "./data/objects".into()),
            public_base_url: var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".into()),
        }),
        "memory" | "mock" => Ok(StorageConfig::Memory),
        other => bail!("unknown storage backend `{}`", other),
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("storage", &self.storage)
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &"<redacted>")
            .field("google_redirect_url", &self.google_redirect_url)
            .field("jwt_secret", &"<redacted>")
            .field("allowed_email_domain", &self.allowed_email_domain)
            .field("allowed_origins", &self.allowed_origins)
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}
