//! Chrome DevTools implementation of the browser engine traits
//!
//! Every [`ChromeLauncher::launch`] starts a separate Chrome process with a
//! throw-away profile directory. The session owns the process, the task that
//! drives the DevTools connection, and the profile directory, and tears all
//! three down in [`BrowserSession::close`].

use crate::engine::{BrowserLauncher, BrowserSession, RenderPage};
use crate::{create_browser_config, Config, NavigationOptions, NetworkIdle, PdfOptions, RenderError};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// How long to wait for Chrome to exit after `Browser.close` before killing it.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
        let profile = ProfileDir::create().await?;
        let browser_config = create_browser_config(&self.config, profile.path())?;

        // On any early return the guard removes the profile directory.
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::InternalFault(format!("browser launch failed: {e}")))?;

        // The handler implements Stream and must be polled for the CDP
        // connection to make progress. Errors are per message, so keep going
        // until the stream ends with the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
            debug!("CDP handler stream ended");
        });

        info!(profile = %profile.path().display(), "Browser launched");

        Ok(Box::new(ChromeSession {
            browser,
            handler: handler_task,
            profile,
        }))
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile: ProfileDir,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::InternalFault(format!("failed to open page: {e}")))?;

        Ok(Box::new(ChromePage { page }))
    }

    async fn close(mut self: Box<Self>) -> Result<(), RenderError> {
        let closed = self.browser.close().await;
        if let Err(e) = &closed {
            warn!("Graceful browser close failed, killing process: {}", e);
        }

        let exited = matches!(timeout(EXIT_TIMEOUT, self.browser.wait()).await, Ok(Ok(_)));
        if !exited {
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("Failed to kill browser process: {}", e);
            }
        }

        self.handler.abort();
        self.profile.remove().await;
        debug!("Browser closed");

        closed
            .map(|_| ())
            .map_err(|e| RenderError::InternalFault(format!("browser close failed: {e}")))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // `Browser` kills its child on drop; the handler task is ours to stop.
        // The profile directory goes with the `ProfileDir` field.
        self.handler.abort();
    }
}

/// Throw-away Chrome profile directory, deleted when dropped.
///
/// A closed session removes it asynchronously. The synchronous removal in
/// `Drop` covers sessions dropped without a close, such as a render task
/// aborted at shutdown.
pub(crate) struct ProfileDir {
    path: PathBuf,
    removed: bool,
}

impl ProfileDir {
    pub(crate) async fn create() -> Result<Self, RenderError> {
        let path = std::env::temp_dir().join(format!("pdf-render-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            RenderError::InternalFault(format!("failed to create profile dir: {e}"))
        })?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn remove(&mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            debug!(profile = %self.path.display(), "Failed to remove profile dir: {}", e);
        }
        self.removed = true;
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            debug!(profile = %self.path.display(), "Failed to remove profile dir: {}", e);
        }
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl RenderPage for ChromePage {
    async fn navigate(
        &mut self,
        url: &str,
        options: &NavigationOptions,
    ) -> Result<(), RenderError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| RenderError::InternalFault(format!("failed to enable network: {e}")))?;

        // Subscribe before navigating so no request of the target page is missed.
        let activity = network_activity(&self.page).await?;

        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(e, options))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| navigation_error(e, options))?;

        wait_for_network_idle(activity, &options.idle).await;
        Ok(())
    }

    async fn pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        let (paper_width, paper_height) = options.format.dimensions_in();
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            ..Default::default()
        };

        self.page
            .pdf(params)
            .await
            .map_err(|e| RenderError::InternalFault(format!("PDF capture failed: {e}")))
    }
}

fn navigation_error(err: CdpError, options: &NavigationOptions) -> RenderError {
    match err {
        CdpError::Timeout => RenderError::RenderTimeout(options.timeout),
        other => RenderError::Navigation(other.to_string()),
    }
}

/// A network request of the page starting or settling.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NetworkActivity {
    Started(String),
    Settled(String),
}

impl NetworkActivity {
    fn apply(self, inflight: &mut HashSet<String>) {
        match self {
            NetworkActivity::Started(id) => {
                inflight.insert(id);
            }
            NetworkActivity::Settled(id) => {
                inflight.remove(&id);
            }
        }
    }
}

async fn network_activity(page: &Page) -> Result<BoxStream<'static, NetworkActivity>, RenderError> {
    let listener_error =
        |e: CdpError| RenderError::InternalFault(format!("failed to watch network: {e}"));

    let started = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(listener_error)?
        .map(|event| NetworkActivity::Started(event.request_id.inner().clone()));
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(listener_error)?
        .map(|event| NetworkActivity::Settled(event.request_id.inner().clone()));
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(listener_error)?
        .map(|event| NetworkActivity::Settled(event.request_id.inner().clone()));

    Ok(stream::select(started, stream::select(finished, failed)).boxed())
}

/// Resolve once at most `idle.max_inflight` requests stay open for
/// `idle.quiet_period`, or when the activity stream ends.
///
/// Has no deadline of its own; the caller bounds it with the navigation timeout.
pub(crate) async fn wait_for_network_idle<S>(mut activity: S, idle: &NetworkIdle)
where
    S: Stream<Item = NetworkActivity> + Unpin,
{
    let mut inflight = HashSet::new();

    loop {
        if inflight.len() <= idle.max_inflight {
            tokio::select! {
                next = activity.next() => match next {
                    Some(event) => event.apply(&mut inflight),
                    None => return,
                },
                _ = sleep(idle.quiet_period) => return,
            }
        } else {
            match activity.next().await {
                Some(event) => event.apply(&mut inflight),
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_idle() -> NetworkIdle {
        NetworkIdle {
            max_inflight: 0,
            quiet_period: Duration::from_millis(500),
        }
    }

    fn started(id: &str) -> NetworkActivity {
        NetworkActivity::Started(id.to_string())
    }

    fn settled(id: &str) -> NetworkActivity {
        NetworkActivity::Settled(id.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_all_requests_settle() {
        let events = stream::iter(vec![started("1"), started("2"), settled("1"), settled("2")])
            .chain(stream::pending());

        let result = timeout(
            Duration::from_secs(10),
            wait_for_network_idle(events, &strict_idle()),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_request_blocks_idle() {
        let events = stream::iter(vec![started("1"), started("2"), settled("1")])
            .chain(stream::pending());

        let result = timeout(
            Duration::from_secs(10),
            wait_for_network_idle(events, &strict_idle()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_tolerates_long_polling() {
        let idle = NetworkIdle {
            max_inflight: 2,
            quiet_period: Duration::from_millis(500),
        };
        let events = stream::iter(vec![started("poll-a"), started("poll-b")])
            .chain(stream::pending());

        let result = timeout(Duration::from_secs(10), wait_for_network_idle(events, &idle)).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_reuses_request_id() {
        let events = stream::iter(vec![started("1"), started("1"), settled("1")])
            .chain(stream::pending());

        let result = timeout(
            Duration::from_secs(10),
            wait_for_network_idle(events, &strict_idle()),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ended_stream_counts_as_idle() {
        let events = stream::iter(vec![started("1")]);
        wait_for_network_idle(events, &strict_idle()).await;
    }

    #[tokio::test]
    async fn test_dropped_profile_dir_is_removed() {
        let profile = ProfileDir::create().await.unwrap();
        let path = profile.path().to_path_buf();
        std::fs::write(path.join("Local State"), b"{}").unwrap();
        assert!(path.exists());

        drop(profile);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_removed_profile_dir_is_not_removed_twice() {
        let mut profile = ProfileDir::create().await.unwrap();
        let path = profile.path().to_path_buf();

        profile.remove().await;
        assert!(!path.exists());
        drop(profile);
    }

    #[test]
    fn test_cdp_timeout_maps_to_render_timeout() {
        let options = NavigationOptions::default();
        assert!(matches!(
            navigation_error(CdpError::Timeout, &options),
            RenderError::RenderTimeout(d) if d == options.timeout
        ));
    }
}
