use crate::{validate_config, Config, ConfigError};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "pdf-render-service")]
#[command(about = "HTTP service that renders web pages to PDF with headless Chrome")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PORT", help = "Listening port")]
    pub port: Option<u16>,

    #[arg(long, env = "BIND_ADDRESS", help = "Listening address")]
    pub bind: Option<IpAddr>,

    #[arg(long, env = "PUBLIC_URL", help = "Base URL advertised in the API docs")]
    pub public_url: Option<Url>,

    #[arg(long, env = "CHROME_PATH", help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(
        long,
        env = "NAVIGATION_TIMEOUT_SECS",
        help = "Navigation timeout in seconds"
    )]
    pub navigation_timeout: Option<u64>,

    #[arg(
        long,
        env = "MAX_CONCURRENT_RENDERS",
        help = "Maximum simultaneous browser instances"
    )]
    pub max_concurrent: Option<usize>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print the effective configuration and exit
    Validate,
}

impl Cli {
    /// Apply command-line and environment overrides on top of `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }

        if let Some(public_url) = &self.public_url {
            config.public_url = Some(public_url.clone());
        }

        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }

        if let Some(timeout) = self.navigation_timeout {
            config.navigation.timeout = Duration::from_secs(timeout);
        }

        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent_renders = Some(max_concurrent);
        }
    }
}

/// Defaults, then the optional config file, then CLI/env overrides.
pub async fn load_config(args: &Cli) -> Result<Config, ConfigError> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content =
            fs::read_to_string(config_path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
        serde_json::from_str(&config_content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?
    } else {
        Config::default()
    };

    args.apply_overrides(&mut config);
    validate_config(&config)?;

    info!("Configuration loaded successfully");
    info!("Listen address: {}", config.listen_addr());
    info!("Navigation timeout: {:?}", config.navigation.timeout);
    match config.max_concurrent_renders {
        Some(limit) => info!("Max concurrent renders: {}", limit),
        None => info!("Max concurrent renders: unbounded"),
    }

    Ok(config)
}

/// Load `.env` from the working directory or one of its parents into the
/// process environment, so the `env` fallbacks of [`Cli`] see its values.
/// Variables already set in the environment win.
///
/// Must run before [`Cli`] is parsed. A missing file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Same as [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(path: &Path) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path)
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Cli::try_parse_from([
            "pdf-render-service",
            "--port",
            "8081",
            "--navigation-timeout",
            "30",
            "--max-concurrent",
            "4",
            "--public-url",
            "https://pdf.example.org",
        ])
        .unwrap();

        let mut config = Config::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.port, 8081);
        assert_eq!(config.navigation.timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_renders, Some(4));
        assert_eq!(config.server_url(), "https://pdf.example.org");
        assert!(args.command.is_none());
    }

    #[test]
    fn test_validate_subcommand() {
        let args = Cli::try_parse_from(["pdf-render-service", "validate", "--verbose"]).unwrap();
        assert_eq!(args.command, Some(Commands::Validate));
        assert!(args.verbose);
    }

    #[test]
    fn test_dotenv_values_reach_env_fallbacks() {
        let dir = std::env::temp_dir().join(format!("pdf-render-env-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        std::fs::write(&env_file, "BIND_ADDRESS=127.0.0.2\n").unwrap();

        load_dotenv_from(&env_file).unwrap();
        let args = Cli::try_parse_from(["pdf-render-service"]).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.bind_address.to_string(), "127.0.0.2");
    }

    #[test]
    fn test_missing_dotenv_file_is_an_error() {
        assert!(load_dotenv_from(Path::new("/nonexistent/.env")).is_err());
    }

    #[tokio::test]
    async fn test_load_config_rejects_missing_file() {
        let args = Cli::try_parse_from([
            "pdf-render-service",
            "--config",
            "/nonexistent/pdf-render.json",
        ])
        .unwrap();

        assert!(matches!(
            load_config(&args).await,
            Err(ConfigError::Read { .. })
        ));
    }
}
