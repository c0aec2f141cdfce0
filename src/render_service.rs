//! PDF render service orchestrating the browser lifecycle
//!
//! One render = launch browser → open page → navigate and wait for network
//! idle → print to PDF → close browser. The browser is closed exactly once on
//! every path, and each render runs on its own task so a caller that goes away
//! mid-render cannot skip the close.

use crate::engine::{BrowserLauncher, BrowserSession};
use crate::metrics;
use crate::{Config, NavigationOptions, PdfOptions, RenderError, RenderRequest, RenderResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

/// PDF render service
///
/// # Examples
///
/// ```rust,no_run
/// use pdf_render_service::{ChromeLauncher, Config, RenderRequest, RenderService};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let launcher = Arc::new(ChromeLauncher::new(config.clone()));
///     let service = RenderService::new(config, launcher);
///
///     let result = service.render(RenderRequest::new("https://example.com")).await?;
///     println!("Rendered {} bytes", result.content_length());
///     Ok(())
/// }
/// ```
pub struct RenderService {
    launcher: Arc<dyn BrowserLauncher>,
    navigation: NavigationOptions,
    pdf: PdfOptions,
    limiter: RenderLimiter,
}

impl RenderService {
    pub fn new(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        metrics::describe_metrics();

        Self {
            launcher,
            limiter: RenderLimiter::new(config.max_concurrent_renders),
            navigation: config.navigation,
            pdf: config.pdf,
        }
    }

    /// Renders currently holding (or waiting for) a browser.
    pub fn in_flight(&self) -> usize {
        self.limiter.active_count()
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderResult, RenderError> {
        let url = request.validated_url()?.to_string();

        let job = RenderJob {
            request_id: uuid::Uuid::new_v4().to_string(),
            url,
            launcher: self.launcher.clone(),
            navigation: self.navigation.clone(),
            pdf: self.pdf.clone(),
            limiter: self.limiter.clone(),
        };
        let request_id = job.request_id.clone();
        let span = info_span!("render", request_id = %job.request_id, url = %job.url);

        // Detached from the caller: dropping this future leaves the job running
        // until it finishes or times out, and the browser still gets closed.
        let handle = tokio::spawn(job.run().instrument(span));
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(request_id = %request_id, panicked = e.is_panic(), "Render task failed: {}", e);
                Err(e.into())
            }
        }
    }
}

struct RenderJob {
    request_id: String,
    url: String,
    launcher: Arc<dyn BrowserLauncher>,
    navigation: NavigationOptions,
    pdf: PdfOptions,
    limiter: RenderLimiter,
}

impl RenderJob {
    async fn run(self) -> Result<RenderResult, RenderError> {
        let _permit = self.limiter.acquire().await?;

        let start_time = Instant::now();
        metrics::record_render_started();
        info!("Rendering PDF");

        let outcome = self.capture().await;
        let duration = start_time.elapsed();
        metrics::record_render_finished(duration, outcome.as_ref().err().map(RenderError::kind));

        match outcome {
            Ok(data) => {
                info!(bytes = data.len(), elapsed_ms = duration.as_millis() as u64, "PDF generated");
                Ok(RenderResult {
                    request_id: self.request_id,
                    url: self.url,
                    data,
                    duration,
                })
            }
            Err(e) => {
                error!(
                    kind = e.kind(),
                    elapsed_ms = duration.as_millis() as u64,
                    "PDF generation failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn capture(&self) -> Result<Vec<u8>, RenderError> {
        let mut session = self.launcher.launch().await?;

        let outcome = self.navigate_and_print(session.as_mut()).await;
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok(data), Ok(())) => Ok(data),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("Browser close failed after render error: {}", close_err);
                Err(e)
            }
        }
    }

    async fn navigate_and_print(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Vec<u8>, RenderError> {
        let mut page = session.new_page().await?;

        match timeout(self.navigation.timeout, page.navigate(&self.url, &self.navigation)).await {
            Ok(navigated) => navigated?,
            Err(_) => return Err(RenderError::RenderTimeout(self.navigation.timeout)),
        }

        let data = page.pdf(&self.pdf).await?;
        if data.is_empty() {
            return Err(RenderError::InternalFault(
                "browser returned an empty PDF".to_string(),
            ));
        }

        Ok(data)
    }
}

/// Optional cap on simultaneous renders plus an in-flight counter.
///
/// Without a cap every request gets its browser immediately.
#[derive(Clone)]
pub struct RenderLimiter {
    semaphore: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
}

impl RenderLimiter {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            semaphore: max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn acquire(&self) -> Result<RenderPermit, RenderError> {
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_in_flight(active);

        // The guard exists before the await so a failed acquire still decrements.
        let mut permit = RenderPermit {
            _permit: None,
            active: self.active.clone(),
        };
        if let Some(semaphore) = &self.semaphore {
            permit._permit = Some(semaphore.clone().acquire_owned().await?);
        }
        Ok(permit)
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn available_permits(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }
}

pub struct RenderPermit {
    _permit: Option<OwnedSemaphorePermit>,
    active: Arc<AtomicUsize>,
}

impl Drop for RenderPermit {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_in_flight(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncapped_limiter_counts_active() {
        let limiter = RenderLimiter::new(None);
        assert_eq!(limiter.available_permits(), None);

        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.active_count(), 2);

        drop(first);
        drop(second);
        assert_eq!(limiter.active_count(), 0);
    }

    #[tokio::test]
    async fn test_capped_limiter_holds_permits() {
        let limiter = RenderLimiter::new(Some(2));

        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_permits(), Some(1));

        drop(permit);
        assert_eq!(limiter.available_permits(), Some(2));
        assert_eq!(limiter.active_count(), 0);
    }
}
