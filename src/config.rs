//! Configuration management with serde serialization/deserialization
//!
//! This module provides the service configuration, the per-render navigation
//! and PDF settings, the request/result types that flow through a render, and
//! the Chrome launch configuration derived from them.

use crate::error::{ConfigError, RenderError};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Main configuration structure for the PDF render service
///
/// # Examples
///
/// ```rust
/// use pdf_render_service::Config;
///
/// let config = Config {
///     port: 8080,
///     max_concurrent_renders: Some(4),
///     ..Default::default()
/// };
/// assert_eq!(config.listen_addr().port(), 8080);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Listening port (default: 3000, overridden by `PORT`)
    pub port: u16,

    /// Listening address (default: 0.0.0.0)
    pub bind_address: IpAddr,

    /// Externally reachable base URL advertised in the API documentation
    ///
    /// Falls back to `http://localhost:<port>` when unset.
    pub public_url: Option<Url>,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for page loads (default: Chrome default)
    pub user_agent: Option<String>,

    /// Navigation and network-idle settings
    pub navigation: NavigationOptions,

    /// PDF capture settings
    pub pdf: PdfOptions,

    /// Upper bound on simultaneously running browsers (default: unbounded)
    ///
    /// Every render launches its own Chrome process. Leaving this unset keeps
    /// the one-browser-per-request behaviour with no cap; set it on hosts
    /// where a burst of requests could exhaust memory.
    pub max_concurrent_renders: Option<usize>,

    /// How long in-flight requests may drain after a shutdown signal
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            public_url: None,
            chrome_path: None,
            user_agent: None,
            navigation: NavigationOptions::default(),
            pdf: PdfOptions::default(),
            max_concurrent_renders: None,
            shutdown_grace: Duration::from_secs(65),
        }
    }
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Base URL used in the OpenAPI `servers` entry and start-up logs.
    pub fn server_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Navigation settings for a single render
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationOptions {
    /// Budget for navigation plus network idle (default: 60 seconds)
    pub timeout: Duration,

    /// When the page counts as settled
    pub idle: NetworkIdle,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            idle: NetworkIdle::default(),
        }
    }
}

/// Network-idle heuristic: at most `max_inflight` open requests for `quiet_period`.
///
/// The default (0 requests, 500ms) matches the strict "networkidle0" strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkIdle {
    pub max_inflight: usize,
    pub quiet_period: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            max_inflight: 0,
            quiet_period: Duration::from_millis(500),
        }
    }
}

/// PDF capture settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Paper size (default: A4)
    pub format: PaperFormat,

    /// Include CSS backgrounds and images (default: true)
    pub print_background: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            print_background: true,
        }
    }
}

/// Supported paper presets
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum PaperFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperFormat {
    /// Width and height in inches, the unit the DevTools print call expects.
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            PaperFormat::A3 => (11.69, 16.54),
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
        }
    }
}

/// Body of `POST /generate-pdf`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// Parse a raw request body. An empty body is treated as `{}`.
    pub fn from_json(body: &[u8]) -> Result<Self, RenderError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| RenderError::InvalidBody(e.to_string()))
    }

    /// The URL to render, or `RenderError::Validation` when absent or blank.
    pub fn validated_url(&self) -> Result<&str, RenderError> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(RenderError::Validation),
        }
    }
}

#[derive(Debug)]
pub struct RenderResult {
    pub request_id: String,
    pub url: String,
    pub data: Vec<u8>,
    pub duration: Duration,
}

impl RenderResult {
    pub const CONTENT_TYPE: &'static str = "application/pdf";
    pub const FILENAME: &'static str = "generated.pdf";

    pub fn content_length(&self) -> usize {
        self.data.len()
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", Self::FILENAME)
    }
}

/// Reject configurations the service cannot run with.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::Invalid("port must be greater than 0".to_string()));
    }

    if config.navigation.timeout.is_zero() {
        return Err(ConfigError::Invalid(
            "navigation timeout must be greater than 0".to_string(),
        ));
    }

    if config.navigation.idle.quiet_period >= config.navigation.timeout {
        return Err(ConfigError::Invalid(
            "network idle quiet period must be shorter than the navigation timeout".to_string(),
        ));
    }

    if config.max_concurrent_renders == Some(0) {
        return Err(ConfigError::Invalid(
            "max concurrent renders must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Generate Chrome command-line arguments based on configuration
///
/// The sandbox is switched off so Chrome can start inside unprivileged
/// containers. Each launch gets its own profile directory, passed separately
/// through [`create_browser_config`].
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    user_data_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, RenderError> {
    use chromiumoxide::browser::BrowserConfig;

    // The CDP request timeout must not fire before our own navigation budget.
    let request_timeout = config.navigation.timeout + Duration::from_secs(5);

    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .user_data_dir(user_data_dir)
        .request_timeout(request_timeout)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(|e| RenderError::InternalFault(format!("invalid browser config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.navigation.timeout, Duration::from_secs(60));
        assert_eq!(config.navigation.idle.max_inflight, 0);
        assert_eq!(config.navigation.idle.quiet_period, Duration::from_millis(500));
        assert_eq!(config.pdf.format, PaperFormat::A4);
        assert!(config.pdf.print_background);
        assert!(config.max_concurrent_renders.is_none());
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "port": 8080, "pdf": { "format": "Letter" } }"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pdf.format, PaperFormat::Letter);
        assert!(config.pdf.print_background);
        assert_eq!(config.navigation.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_server_url() {
        let mut config = Config::default();
        assert_eq!(config.server_url(), "http://localhost:3000");

        config.public_url = Some(Url::parse("https://pdf.example.org/").unwrap());
        assert_eq!(config.server_url(), "https://pdf.example.org");
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&Config::default()).is_ok());

        let zero_port = Config {
            port: 0,
            ..Default::default()
        };
        assert!(validate_config(&zero_port).is_err());

        let zero_cap = Config {
            max_concurrent_renders: Some(0),
            ..Default::default()
        };
        assert!(validate_config(&zero_cap).is_err());

        let mut idle_too_long = Config::default();
        idle_too_long.navigation.timeout = Duration::from_millis(200);
        assert!(validate_config(&idle_too_long).is_err());
    }

    #[test]
    fn test_a4_dimensions() {
        let (width, height) = PaperFormat::A4.dimensions_in();
        assert!((width - 8.27).abs() < f64::EPSILON);
        assert!((height - 11.69).abs() < f64::EPSILON);
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            RenderRequest::default().validated_url(),
            Err(RenderError::Validation)
        ));
        assert!(matches!(
            RenderRequest::new("").validated_url(),
            Err(RenderError::Validation)
        ));
        assert!(matches!(
            RenderRequest::new("   ").validated_url(),
            Err(RenderError::Validation)
        ));
        assert_eq!(
            RenderRequest::new(" https://example.com ").validated_url().unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_request_from_json() {
        assert!(RenderRequest::from_json(b"").unwrap().url.is_none());
        assert!(RenderRequest::from_json(b"{}").unwrap().url.is_none());
        assert!(RenderRequest::from_json(br#"{"url":null}"#).unwrap().url.is_none());
        assert_eq!(
            RenderRequest::from_json(br#"{"url":"https://example.com","extra":1}"#)
                .unwrap()
                .url
                .as_deref(),
            Some("https://example.com")
        );
        assert!(matches!(
            RenderRequest::from_json(b"not json"),
            Err(RenderError::InvalidBody(_))
        ));
        assert!(matches!(
            RenderRequest::from_json(br#"{"url":42}"#),
            Err(RenderError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_chrome_args_disable_sandbox() {
        let args = get_chrome_args(&Config::default());
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-setuid-sandbox".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent")));

        let config = Config {
            user_agent: Some("pdf-bot/1.0".to_string()),
            ..Default::default()
        };
        assert!(get_chrome_args(&config).contains(&"--user-agent=pdf-bot/1.0".to_string()));
    }
}
