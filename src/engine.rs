//! Browser engine capability set
//!
//! The render service only talks to these traits. [`crate::chrome`] provides
//! the Chrome DevTools implementation; tests substitute in-memory engines.

use crate::{NavigationOptions, PdfOptions, RenderError};
use async_trait::async_trait;

/// Starts isolated browser processes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a fresh browser with its own profile and sandboxing disabled.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// A running browser owned by exactly one render.
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, RenderError>;

    /// Terminate the browser process. Consumes the session so it cannot be
    /// closed twice.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// A page/tab context inside a [`BrowserSession`].
#[async_trait]
pub trait RenderPage: Send {
    /// Navigate and wait for the idle condition in `options`.
    ///
    /// Implementations report unreachable or malformed targets as
    /// [`RenderError::Navigation`]. The caller enforces `options.timeout`.
    async fn navigate(&mut self, url: &str, options: &NavigationOptions)
        -> Result<(), RenderError>;

    async fn pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;
}
