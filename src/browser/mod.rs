//! Chromium-backed [`BrowserPage`] using chromiumoxide.
//!
//! Element lookups that depend on rendered text or visibility are evaluated
//! page-side in JavaScript, since CDP has no direct equivalent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::PageError;
use crate::traits::{BrowserPage, Locator};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// A launched Chromium instance with its CDP handler task
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch Chromium with a 1920x1080 window.
    ///
    /// This is the only failure in a sweep that aborts the run.
    pub async fn launch(headless: bool, chrome_path: Option<PathBuf>) -> Result<Self> {
        info!("Launching browser (headless={})", headless);

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg(format!("--user-agent={USER_AGENT}"))
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self { browser, handler })
    }

    pub async fn new_page(&self) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumPage { page })
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("failed to close browser")?;
        self.browser.wait().await.ok();
        self.handler.abort();
        Ok(())
    }
}

/// One Chromium tab
pub struct ChromiumPage {
    page: Page,
}

fn cdp(e: impl std::fmt::Display) -> PageError {
    PageError::Browser(e.to_string())
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// JavaScript expression evaluating to the located element or `null`
fn element_expr(locator: &Locator) -> String {
    match locator {
        Locator::Css(css) => format!("document.querySelector({})", js_string(css)),
        Locator::CssWithText { css, texts } => {
            let texts = serde_json::to_string(texts).unwrap_or_else(|_| "[]".to_string());
            format!(
                "(Array.from(document.querySelectorAll({css})).find(el => {{ \
                     const text = el.innerText || ''; \
                     return {texts}.some(t => text.includes(t)); \
                 }}) || null)",
                css = js_string(css),
            )
        }
    }
}

impl ChromiumPage {
    /// Evaluate `body` with `el` bound to the located element; returns false when absent
    async fn with_element(&self, locator: &Locator, body: &str) -> Result<bool, PageError> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; {body} return true; }})()",
            element_expr(locator)
        );
        self.page
            .evaluate(script)
            .await
            .map_err(cdp)?
            .into_value::<bool>()
            .map_err(cdp)
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        let timed_out = || PageError::Timeout {
            action: format!("navigation to {url}"),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| timed_out())?
            .map_err(cdp)?;
        tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| timed_out())?
            .map_err(cdp)?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), PageError> {
        let locator = Locator::css(selector);
        if !self.with_element(&locator, "el.value = '';").await? {
            return Err(PageError::NotFound {
                locator: selector.to_string(),
            });
        }
        let element = self.page.find_element(selector).await.map_err(cdp)?;
        element.click().await.map_err(cdp)?;
        element.type_str(value).await.map_err(cdp)?;
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<(), PageError> {
        match locator {
            Locator::Css(css) => {
                let element = self.page.find_element(css.as_str()).await.map_err(|_| {
                    PageError::NotFound {
                        locator: locator.to_string(),
                    }
                })?;
                element.click().await.map_err(cdp)?;
                Ok(())
            }
            Locator::CssWithText { .. } => {
                if self.with_element(locator, "el.click();").await? {
                    Ok(())
                } else {
                    Err(PageError::NotFound {
                        locator: locator.to_string(),
                    })
                }
            }
        }
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, PageError> {
        self.with_element(
            locator,
            "const r = el.getBoundingClientRect(); \
             const s = window.getComputedStyle(el); \
             if (r.width === 0 || r.height === 0) return false; \
             if (s.visibility === 'hidden' || s.display === 'none') return false;",
        )
        .await
    }

    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), PageError> {
        let script = format!("window.scrollTo(0, document.body.scrollHeight * {fraction})");
        self.page.evaluate(script).await.map_err(cdp)?;
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<(), PageError> {
        if self
            .with_element(locator, "el.scrollIntoView({ block: 'center' });")
            .await?
        {
            Ok(())
        } else {
            Err(PageError::NotFound {
                locator: locator.to_string(),
            })
        }
    }

    async fn content(&self) -> Result<String, PageError> {
        self.page.content().await.map_err(cdp)
    }

    async fn title(&self) -> Result<Option<String>, PageError> {
        self.page.get_title().await.map_err(cdp)
    }
}
