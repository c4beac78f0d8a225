use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Origin used when building public image URLs.
    pub public_base_url: String,
    pub db_max_connections: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "MetaJaya Shop catalog API")]
pub struct Args {
    /// Host to bind to (overrides SHOP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SHOP_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image objects are stored (overrides SHOP_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides SHOP_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Origin for public object URLs (overrides SHOP_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let cfg = Self::merge(
            args.host,
            args.port,
            args.storage_dir,
            args.database_url,
            args.public_base_url,
        )?;
        Ok((cfg, args.migrate))
    }

    fn merge(
        host: Option<String>,
        port: Option<u16>,
        storage_dir: Option<String>,
        database_url: Option<String>,
        public_base_url: Option<String>,
    ) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("SHOP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("SHOP_PORT", 3000u16)?;
        let env_storage = env::var("SHOP_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("SHOP_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/shop.db".into());
        let db_max_connections = parse_env("SHOP_DB_MAX_CONNECTIONS", 5u32)?;

        // --- Merge ---
        let port = port.unwrap_or(env_port);
        let public_base_url = match public_base_url {
            Some(url) => url,
            None => env::var("SHOP_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
        };

        Ok(Self {
            host: host.unwrap_or(env_host),
            port,
            storage_dir: storage_dir.unwrap_or(env_storage),
            database_url: database_url.unwrap_or(env_db),
            public_base_url,
            db_max_connections,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
