//! Listing harvester: drains the "Visa mer" pagination and collects detail links.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::Timing;
use crate::error::{ExtractError, PageError};
use crate::html::{element_text, selector};
use crate::models::ListingEntry;
use crate::traits::{BrowserPage, Locator, ScraperConfig};

/// Contract length as printed on a listing card, e.g. "3 år" or "12 månader"
static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\s*(?:år|månader))").expect("valid duration regex"));

/// Fraction of the page height scrolled to before probing for the button
const NEAR_BOTTOM: f64 = 0.9;

pub struct ListingHarvester<'a> {
    config: &'a ScraperConfig,
    timing: &'a Timing,
    card: Selector,
    link: Selector,
    base: Url,
}

impl<'a> ListingHarvester<'a> {
    /// # Errors
    ///
    /// Returns `ExtractError` if a listing selector or the site origin does not parse.
    pub fn new(config: &'a ScraperConfig, timing: &'a Timing) -> Result<Self, ExtractError> {
        let base = Url::parse(&config.base_url).map_err(|e| ExtractError::BaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            config,
            timing,
            card: selector(&config.selectors.listing_card)?,
            link: selector(&config.selectors.listing_link)?,
            base,
        })
    }

    /// Expand the result list until "show more" stops appearing, then read the cards.
    ///
    /// The loop has no iteration cap; a list that never exhausts keeps the
    /// session here.
    ///
    /// # Errors
    ///
    /// Returns `PageError` only when the rendered document cannot be read.
    pub async fn harvest<P>(&self, page: &P) -> Result<Vec<ListingEntry>, PageError>
    where
        P: BrowserPage + ?Sized,
    {
        let clicks = self.drain_show_more(page).await;
        debug!("Expanded result list {} times", clicks);

        let html = page.content().await?;
        let entries = self.parse_listing(&html);
        info!("  Found {} contracts", entries.len());
        Ok(entries)
    }

    /// Extract listing entries from the rendered result list, in document order.
    ///
    /// Cards without a usable link are skipped.
    pub fn parse_listing(&self, html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(html);
        document
            .select(&self.card)
            .filter_map(|c| {
                let entry = card_entry(c, &self.link, &self.base);
                if entry.is_none() {
                    debug!("Skipping listing card without detail link");
                }
                entry
            })
            .collect()
    }

    /// Click "show more" until it is no longer visible; returns the number of clicks
    async fn drain_show_more<P>(&self, page: &P) -> usize
    where
        P: BrowserPage + ?Sized,
    {
        let selectors = &self.config.selectors;
        let show_more = Locator::with_text(selectors.show_more.as_str(), &selectors.show_more_text);
        let mut clicks = 0;

        loop {
            match self.expand_once(page, &show_more).await {
                Ok(true) => clicks += 1,
                Ok(false) => break,
                Err(e) => {
                    debug!("Stopping pagination after {} clicks: {}", clicks, e);
                    break;
                }
            }
        }
        clicks
    }

    async fn expand_once<P>(&self, page: &P, show_more: &Locator) -> Result<bool, PageError>
    where
        P: BrowserPage + ?Sized,
    {
        page.scroll_to_fraction(NEAR_BOTTOM).await?;
        page.settle(self.timing.scroll_settle).await;

        if !page
            .wait_for_visible(show_more, self.timing.show_more_probe)
            .await?
        {
            return Ok(false);
        }

        page.scroll_into_view(show_more).await?;
        page.click(show_more).await?;
        page.settle(self.timing.show_more_settle).await;
        Ok(true)
    }
}

/// Resolve `href` against the site origin, rejecting links that leave it
fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    (url.origin() == base.origin()).then(|| url.to_string())
}

fn card_entry(card: ElementRef<'_>, link: &Selector, base: &Url) -> Option<ListingEntry> {
    let href = card.select(link).next()?.value().attr("href")?;
    let url = absolute_url(base, href)?;
    let text = element_text(card);
    let contract_duration = DURATION.captures(&text).map(|c| c[1].to_string());
    Some(ListingEntry {
        url,
        contract_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(href: Option<&str>, text: &str) -> String {
        let link = href.map_or_else(String::new, |h| {
            format!(r#"<div class="aVZNlNTkwbkNs_DcrCqg"><a class="env-button" href="{h}">Till avtalet</a></div>"#)
        });
        format!(r#"<div class="pLyFbiEj6YnPeSF9DI94"><p>{text}</p>{link}</div>"#)
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", cards.join(""))
    }

    fn parse_listing(html: &str) -> Vec<ListingEntry> {
        let config = ScraperConfig::elpriskollen();
        let timing = Timing::default();
        ListingHarvester::new(&config, &timing).unwrap().parse_listing(html)
    }

    #[test]
    fn extracts_links_and_durations_in_document_order() {
        let html = page(&[
            card(Some("/avtal/1"), "Fast pris<br>Bindningstid 3 år"),
            card(Some("/avtal/2"), "Rörligt pris"),
            card(Some("/avtal/3"), "Avtalstid 12 månader"),
        ]);

        let entries = parse_listing(&html);

        assert_eq!(
            entries,
            vec![
                ListingEntry {
                    url: "https://elpriskollen.se/avtal/1".to_string(),
                    contract_duration: Some("3 år".to_string()),
                },
                ListingEntry {
                    url: "https://elpriskollen.se/avtal/2".to_string(),
                    contract_duration: None,
                },
                ListingEntry {
                    url: "https://elpriskollen.se/avtal/3".to_string(),
                    contract_duration: Some("12 månader".to_string()),
                },
            ]
        );
    }

    #[test]
    fn skips_cards_without_link() {
        let html = page(&[
            card(None, "Kampanj"),
            card(Some("/avtal/9"), "1 år"),
            card(Some("https://tracker.example.com/x"), "2 år"),
        ]);

        let entries = parse_listing(&html);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://elpriskollen.se/avtal/9");
    }

    #[test]
    fn every_url_starts_with_site_origin() {
        let html = page(&[
            card(Some("avtal/relative"), ""),
            card(Some(" /avtal/padded "), ""),
            card(Some("https://elpriskollen.se/avtal/absolute"), ""),
        ]);

        let entries = parse_listing(&html);

        assert_eq!(entries.len(), 3);
        assert!(
            entries
                .iter()
                .all(|e| e.url.starts_with("https://elpriskollen.se/"))
        );
    }

    #[test]
    fn inline_markup_in_duration_stays_on_one_line() {
        let entries = parse_listing(&page(&[card(Some("/avtal/4"), "Bindningstid <b>3</b> år")]));
        assert_eq!(entries[0].contract_duration.as_deref(), Some("3 år"));
    }

    #[test]
    fn invalid_listing_selector_fails_construction() {
        let timing = Timing::default();

        let mut config = ScraperConfig::elpriskollen();
        config.selectors.listing_card = "div[".to_string();
        assert!(matches!(
            ListingHarvester::new(&config, &timing),
            Err(ExtractError::Selector { .. })
        ));

        let mut config = ScraperConfig::elpriskollen();
        config.selectors.listing_link = "a[href".to_string();
        assert!(ListingHarvester::new(&config, &timing).is_err());

        let mut config = ScraperConfig::elpriskollen();
        config.base_url = "elpriskollen".to_string();
        assert!(matches!(
            ListingHarvester::new(&config, &timing),
            Err(ExtractError::BaseUrl { .. })
        ));
    }

    #[test]
    fn empty_result_list_yields_no_entries() {
        assert!(parse_listing(&page(&[])).is_empty());
    }
}
