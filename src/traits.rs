//! Traits and interfaces between the scraping flow and the browser engine

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{ConfigError, PageError};

/// Poll interval used by [`BrowserPage::wait_for_visible`]
const VISIBILITY_POLL: Duration = Duration::from_millis(250);

/// Configuration for the comparison site
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Display name for the website
    pub name: String,
    /// Origin every harvested link must resolve against
    pub base_url: String,
    /// CSS selectors for the wizard, the result list and the detail pages
    pub selectors: SiteSelectors,
}

/// CSS selectors for the parts of the site the flow touches
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Cookie consent button and its accepted captions
    pub cookie_button: String,
    pub cookie_button_text: Vec<String>,
    /// Postal code input on the first wizard page
    pub postal_code_input: String,
    /// Annual consumption input on the second wizard page
    pub consumption_input: String,
    /// Wizard "next page" button
    pub next_page: String,
    /// Contract type buttons, addressed with `:nth-child`
    pub contract_type_buttons: String,
    /// 5-year commitment link shown for fixed-price products
    pub fixed_price_five_years: String,
    /// Final "Fortsätt" button
    pub continue_button: String,
    /// "Visa mer" pagination button and its captions in both locales
    pub show_more: String,
    pub show_more_text: Vec<String>,
    /// One card per offer in the result list
    pub listing_card: String,
    /// Detail link within a listing card
    pub listing_link: String,
    /// Header labels: contract type first, electrical area second
    pub detail_header_labels: String,
    pub detail_contract_name: String,
    /// Provider block holding the name and the contact headings
    pub detail_provider_block: String,
    pub detail_provider_name: String,
    pub detail_reference_price: String,
    pub detail_consumption_info: String,
    pub detail_price_rows: String,
    /// Outbound links: change contract, terms, supplier website
    pub detail_outbound_links: String,
}

impl ScraperConfig {
    /// Selectors for elpriskollen.se as rendered by its current frontend build
    pub fn elpriskollen() -> Self {
        Self {
            name: "Elpriskollen".to_string(),
            base_url: "https://elpriskollen.se".to_string(),
            selectors: SiteSelectors {
                cookie_button: "button".to_string(),
                cookie_button_text: vec!["Godkänn alla kakor".to_string()],
                postal_code_input: "#pcode".to_string(),
                consumption_input: "#annual_consumption".to_string(),
                next_page: "#next-page".to_string(),
                contract_type_buttons: ".contractTypeButtons > a.selectButton".to_string(),
                fixed_price_five_years: "#app > div > div.guide__preamble > div.env-form-element > \
                     div.fastaDesktop > div.contractTypeFastChild > div:nth-child(6) > a"
                    .to_string(),
                continue_button: "#app > div > div.epk-button > a.env-button".to_string(),
                show_more: "button.env-button".to_string(),
                show_more_text: vec!["Visa mer".to_string(), "Show more".to_string()],
                listing_card: "div.pLyFbiEj6YnPeSF9DI94".to_string(),
                listing_link: "div.aVZNlNTkwbkNs_DcrCqg > a.env-button".to_string(),
                detail_header_labels: "div.SvveEH5y1QdtM2MuMz07 div.e3icZ8YXD7PTtS8321U3 \
                     div.AOqumsb2RS0O78r9kzMX"
                    .to_string(),
                detail_contract_name: "div.SvveEH5y1QdtM2MuMz07 h1".to_string(),
                detail_provider_block: "div.AWGCPcYaBUXjAUTBLl0c".to_string(),
                detail_provider_name: "div.AWGCPcYaBUXjAUTBLl0c h3".to_string(),
                detail_reference_price: "div.gdeuxYpfTrq6O5EdKun6 h2".to_string(),
                detail_consumption_info: "div.gdeuxYpfTrq6O5EdKun6 p".to_string(),
                detail_price_rows: "table.env-table.env-table--zebra tbody tr".to_string(),
                detail_outbound_links: "div.Tgc321GpCPUvHqOKChsl a[target='_blank']".to_string(),
            },
        }
    }

    pub fn home_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

/// How a [`BrowserPage`] finds an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// First element matching the selector
    Css(String),
    /// First element matching the selector whose rendered text contains any of `texts`
    CssWithText { css: String, texts: Vec<String> },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn with_text(selector: impl Into<String>, texts: &[String]) -> Self {
        Self::CssWithText {
            css: selector.into(),
            texts: texts.to_vec(),
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Css(css) | Self::CssWithText { css, .. } => css,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => f.write_str(css),
            Self::CssWithText { css, texts } => write!(f, "{css}:has-text({})", texts.join("|")),
        }
    }
}

/// A UI action whose stable identity is its position among siblings, not its label
pub trait ActionSelector: Copy {
    /// 1-based sibling position
    fn ordinal(self) -> usize;

    /// Human readable label, for logs and records only
    fn label(self) -> &'static str;

    /// Locator for this action among the siblings matched by `siblings`
    fn locator(self, siblings: &str) -> Locator {
        Locator::css(format!("{siblings}:nth-child({})", self.ordinal()))
    }
}

/// Check that an ordinal table covers `1..=expected` exactly once
///
/// # Errors
///
/// Returns `ConfigError` when the table has the wrong size or a gap/duplicate.
pub fn validate_ordinals<A: ActionSelector>(
    table: &[A],
    expected: usize,
) -> Result<(), ConfigError> {
    if table.len() != expected {
        return Err(ConfigError::OrdinalTable(format!(
            "expected {expected} entries, found {}",
            table.len()
        )));
    }

    let mut ordinals: Vec<usize> = table.iter().map(|a| a.ordinal()).collect();
    ordinals.sort_unstable();
    if ordinals.iter().copied().ne(1..=expected) {
        return Err(ConfigError::OrdinalTable(format!(
            "ordinals {ordinals:?} are not 1..={expected}"
        )));
    }

    Ok(())
}

/// One browser tab driven through the site.
///
/// Implementations back this with a real engine (see
/// [`ChromiumPage`](crate::browser::ChromiumPage)) or, in tests, with a
/// scripted fake DOM.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load event, failing after `timeout`
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    /// Replace the value of an input with `value`
    async fn fill(&self, selector: &str, value: &str) -> Result<(), PageError>;

    async fn click(&self, locator: &Locator) -> Result<(), PageError>;

    /// Whether the element exists and is rendered with a non-empty box
    async fn is_visible(&self, locator: &Locator) -> Result<bool, PageError>;

    /// Scroll the window to `fraction` of the document height
    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), PageError>;

    async fn scroll_into_view(&self, locator: &Locator) -> Result<(), PageError>;

    /// Rendered HTML of the whole document
    async fn content(&self) -> Result<String, PageError>;

    async fn title(&self) -> Result<Option<String>, PageError>;

    /// Fixed wait standing in for a render-completion signal the site does not emit
    async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Poll [`is_visible`](Self::is_visible) until it holds or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout; only engine errors are `Err`.
    async fn wait_for_visible(&self, locator: &Locator, timeout: Duration) -> Result<bool, PageError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(locator).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(VISIBILITY_POLL.min(timeout)).await;
        }
    }

    /// Wait for `locator` to become visible, then click it
    async fn click_when_visible(&self, locator: &Locator, timeout: Duration) -> Result<(), PageError> {
        if !self.wait_for_visible(locator, timeout).await? {
            return Err(PageError::Timeout {
                action: format!("waiting for {locator}"),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        self.click(locator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContractType;

    #[derive(Debug, Clone, Copy)]
    struct Tab(usize);

    impl ActionSelector for Tab {
        fn ordinal(self) -> usize {
            self.0
        }
        fn label(self) -> &'static str {
            "tab"
        }
    }

    #[test]
    fn contract_type_table_is_valid() {
        assert!(validate_ordinals(&ContractType::ALL, 5).is_ok());
    }

    #[test]
    fn ordinal_table_rejects_gaps_duplicates_and_wrong_size() {
        assert!(validate_ordinals(&[Tab(1), Tab(3)], 2).is_err());
        assert!(validate_ordinals(&[Tab(1), Tab(1)], 2).is_err());
        assert!(validate_ordinals(&[Tab(1), Tab(2)], 3).is_err());
        assert!(validate_ordinals(&[Tab(2), Tab(1)], 2).is_ok());
    }

    #[test]
    fn ordinal_locator_uses_nth_child() {
        let locator = ContractType::FastPris.locator(".contractTypeButtons > a.selectButton");
        assert_eq!(
            locator,
            Locator::css(".contractTypeButtons > a.selectButton:nth-child(5)")
        );
    }

    #[test]
    fn text_locator_display_lists_captions() {
        let locator = Locator::with_text(
            "button.env-button",
            &["Visa mer".to_string(), "Show more".to_string()],
        );
        assert_eq!(locator.to_string(), "button.env-button:has-text(Visa mer|Show more)");
        assert_eq!(locator.selector(), "button.env-button");
    }

    #[test]
    fn home_url_has_single_trailing_slash() {
        let mut config = ScraperConfig::elpriskollen();
        assert_eq!(config.home_url(), "https://elpriskollen.se/");
        config.base_url.push('/');
        assert_eq!(config.home_url(), "https://elpriskollen.se/");
    }
}
