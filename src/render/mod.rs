//! Page rendering
//!
//! The pipeline needs the fully rendered DOM, not the raw response body,
//! because target pages may construct their content client-side. The
//! `PageRenderer` trait keeps that concern behind one narrow call so the
//! headless browser can be swapped for a plain HTTP fetch (pages that need
//! no JavaScript) or mocked entirely in tests.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::USER_AGENT;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for page renderers
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load a URL and return its rendered markup
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

/// Rendered page result
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after any redirects
    pub url: String,
    /// Rendered HTML content
    pub html: String,
}

/// Renderer for pages that need no JavaScript execution: a plain HTTP GET
pub struct StaticRenderer {
    client: reqwest::Client,
}

impl StaticRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        debug!("Fetching without JavaScript: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {}: {}", status, url)));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read body of {}: {}", url, e)))?;

        Ok(RenderedPage {
            url: final_url,
            html,
        })
    }
}

#[cfg(feature = "js-rendering")]
mod browser_impl {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::time::timeout;
    use tracing::warn;

    /// Where Chrome exposes the status of the document request
    const NAV_STATUS_JS: &str = "(() => { \
        const e = performance.getEntriesByType('navigation')[0]; \
        return e && e.responseStatus ? e.responseStatus : 0; })()";

    /// Headless browser renderer
    ///
    /// A browser process is launched and torn down per call. Ingestion is
    /// not latency-critical, and a fresh browser guarantees no state leaks
    /// between pages.
    pub struct HeadlessRenderer {
        config: RenderConfig,
    }

    impl HeadlessRenderer {
        pub fn new(config: RenderConfig) -> Self {
            Self { config }
        }

        async fn launch(&self) -> Result<(Browser, tokio::task::JoinHandle<()>)> {
            debug!("Launching headless Chrome browser...");

            let mut builder = BrowserConfig::builder();

            if self.config.no_sandbox {
                builder = builder.no_sandbox();
            }

            builder = builder
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--disable-extensions");

            let browser_config = builder
                .build()
                .map_err(|e| Error::Fetch(format!("failed to build browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| Error::Fetch(format!("failed to launch browser: {}", e)))?;

            let handle = tokio::spawn(async move {
                while let Some(result) = handler.next().await {
                    if result.is_err() {
                        break;
                    }
                }
            });

            Ok((browser, handle))
        }

        async fn render_page(&self, browser: &Browser, url: &str) -> Result<RenderedPage> {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| Error::Fetch(format!("failed to open {}: {}", url, e)))?;

            let load_timeout = Duration::from_secs(self.config.timeout_secs);
            timeout(load_timeout, page.wait_for_navigation())
                .await
                .map_err(|_| Error::Fetch(format!("page load timeout: {}", url)))?
                .map_err(|e| Error::Fetch(format!("navigation failed for {}: {}", url, e)))?;

            if self.config.render_wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.render_wait_ms)).await;
            }

            let status = page
                .evaluate(NAV_STATUS_JS)
                .await
                .ok()
                .and_then(|v| v.into_value::<i64>().ok())
                .unwrap_or(0);
            if status != 0 && !(200..300).contains(&status) {
                return Err(Error::Fetch(format!("HTTP {}: {}", status, url)));
            }

            let final_url = page
                .url()
                .await
                .map_err(|e| Error::Fetch(format!("failed to get URL: {}", e)))?
                .map(|u| u.to_string())
                .unwrap_or_else(|| url.to_string());

            let html = page
                .content()
                .await
                .map_err(|e| Error::Fetch(format!("failed to get rendered content: {}", e)))?;

            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }

            Ok(RenderedPage {
                url: final_url,
                html,
            })
        }
    }

    #[async_trait]
    impl PageRenderer for HeadlessRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage> {
            debug!("Rendering page with headless browser: {}", url);

            let (mut browser, handler) = self.launch().await?;
            let result = self.render_page(&browser, url).await;

            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            handler.abort();

            result
        }
    }
}

#[cfg(feature = "js-rendering")]
pub use browser_impl::HeadlessRenderer;

/// Check if JS rendering is compiled in
pub fn is_js_rendering_available() -> bool {
    cfg!(feature = "js-rendering")
}

/// Build the renderer the config asks for, falling back to a static fetch
/// when the headless browser is not compiled in
pub fn default_renderer(config: &RenderConfig) -> Result<Arc<dyn PageRenderer>> {
    #[cfg(feature = "js-rendering")]
    if config.js_rendering {
        return Ok(Arc::new(HeadlessRenderer::new(config.clone())));
    }

    Ok(Arc::new(StaticRenderer::new(config)?))
}
