use anyhow::{Context, Result};
use rice_notes::{
    config::{AppConfig, StorageConfig},
    routes::routes::app,
    services::{
        auth_service::{AuthService, DomainPolicy},
        google::GoogleProvider,
        note_service::NoteService,
        token_service::TokenService,
    },
    state::{AppState, HttpSettings},
    stores::{
        blob::{BlobStore, MemoryBlobStore},
        local::{LinkSigner, LocalBlobStore},
        metadata::SqliteNoteRepository,
        s3::S3BlobStore,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Local env file, if any ---
    if let Err(err) = dotenvy::from_filename(".local.env") {
        if !err.not_found() {
            return Err(err).context("loading .local.env");
        }
    }

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting rice-notes with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    ensure_sqlite_parent(&cfg.database_url).await?;
    let options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing DATABASE_URL `{}`", cfg.database_url))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("connecting to the database")?;

    let repo = SqliteNoteRepository::new(pool);
    repo.migrate().await.context("applying the database schema")?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Blob store ---
    let mut local_files = None;
    let blobs: Arc<dyn BlobStore> = match &cfg.storage {
        StorageConfig::S3 { bucket, region } => Arc::new(S3BlobStore::new(bucket, region)?),
        StorageConfig::Local {
            dir,
            public_base_url,
        } => {
            fs::create_dir_all(dir).await?;
            tracing::info!("Storing notes on disk under {}", dir);
            let store = Arc::new(LocalBlobStore::new(
                dir.as_str(),
                public_base_url,
                LinkSigner::new(cfg.jwt_secret.as_bytes()),
            )?);
            local_files = Some(store.clone());
            store
        }
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory blob store; notes are lost on restart");
            Arc::new(MemoryBlobStore::new())
        }
    };

    // --- Core services ---
    let tokens = Arc::new(TokenService::new(&cfg.jwt_secret));
    let provider = Arc::new(GoogleProvider::new(
        cfg.google_client_id.clone(),
        cfg.google_client_secret.clone(),
        cfg.google_redirect_url.clone(),
    )?);
    let auth = AuthService::new(
        provider,
        tokens.clone(),
        DomainPolicy::new(&cfg.allowed_email_domain),
    );

    let state = AppState {
        notes: Arc::new(NoteService::new(Arc::new(repo), blobs)),
        auth: Arc::new(auth),
        tokens,
        local_files,
        settings: Arc::new(HttpSettings {
            frontend_url: cfg.frontend_url.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
        }),
    };

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// SQLite will create the database file but not its directory.
async fn ensure_sqlite_parent(database_url: &str) -> Result<()> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    let db_path = db_path.split('?').next().unwrap_or_default();
    if db_path.is_empty() || db_path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await? {
            fs::create_dir_all(parent).await?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
