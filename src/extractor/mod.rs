//! Detail extractor: turns one offer page into an [`OfferRecord`].
//!
//! The page is read once as an HTML snapshot and split into independent
//! field groups. A group that fails leaves its fields empty and the others
//! are still attempted; only failing to load the page drops the record.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::error::{ExtractError, PageError};
use crate::html::{body_text, element_text, first_text, inline_text, selector};
use crate::models::{ListingEntry, OfferRecord, QueryCombination};
use crate::traits::{ActionSelector, BrowserPage, ScraperConfig, SiteSelectors};

/// Energy source categories, matched as lowercase substrings of the page text
const ENERGY_KEYWORDS: [&str; 7] = [
    "förnybar",
    "vatten",
    "vind",
    "solkraft",
    "kärnkraft",
    "fossilt",
    "residualmix",
];

static NOTICE_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"uppsägningstid[:\s]*([^\n.]+)").expect("valid notice regex"));

/// The header pair is positional; this only flags a likely swap
static AREA_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSE\s?[1-4]\b").expect("valid area regex"));

/// Selectors for the detail page, compiled once per sweep
pub struct DetailSelectors {
    header_labels: Selector,
    contract_name: Selector,
    provider_block: Selector,
    provider_name: Selector,
    contact_heading: Selector,
    reference_price: Selector,
    consumption_info: Selector,
    price_rows: Selector,
    price_cell: Selector,
    outbound_links: Selector,
}

impl DetailSelectors {
    /// # Errors
    ///
    /// Returns `ExtractError::Selector` for the first selector that does not parse.
    pub fn compile(selectors: &SiteSelectors) -> Result<Self, ExtractError> {
        Ok(Self {
            header_labels: selector(&selectors.detail_header_labels)?,
            contract_name: selector(&selectors.detail_contract_name)?,
            provider_block: selector(&selectors.detail_provider_block)?,
            provider_name: selector(&selectors.detail_provider_name)?,
            contact_heading: selector("h4")?,
            reference_price: selector(&selectors.detail_reference_price)?,
            consumption_info: selector(&selectors.detail_consumption_info)?,
            price_rows: selector(&selectors.detail_price_rows)?,
            price_cell: selector("td")?,
            outbound_links: selector(&selectors.detail_outbound_links)?,
        })
    }
}

/// Collects field groups into one record, turning failed groups into defaults
struct FieldGroups<'u> {
    url: &'u str,
    degraded: Vec<&'static str>,
}

impl<'u> FieldGroups<'u> {
    fn new(url: &'u str) -> Self {
        Self {
            url,
            degraded: Vec::new(),
        }
    }

    fn attempt<T: Default>(&mut self, group: &'static str, result: Result<T, ExtractError>) -> T {
        result.unwrap_or_else(|e| {
            debug!("{}: {} group degraded: {}", self.url, group, e);
            self.degraded.push(group);
            T::default()
        })
    }
}

fn required(value: Option<String>, what: &'static str) -> Result<String, ExtractError> {
    value.ok_or(ExtractError::Missing { what })
}

/// Contract type label and electrical area, by position
fn header_pair(doc: &Html, sel: &DetailSelectors) -> Result<(Option<String>, Option<String>), ExtractError> {
    let labels: Vec<String> = doc
        .select(&sel.header_labels)
        .take(2)
        .map(inline_text)
        .collect();
    if labels.is_empty() {
        return Err(ExtractError::Missing {
            what: "header labels",
        });
    }

    let mut labels = labels.into_iter();
    let contract_type = labels.next();
    let electrical_area = labels.next();
    if let Some(area) = &electrical_area
        && !AREA_CODE.is_match(area)
    {
        warn!("Electrical area {:?} does not look like an area code", area);
    }
    Ok((contract_type, electrical_area))
}

/// Comparison price headline and the consumption it assumes
fn price_reference(doc: &Html, sel: &DetailSelectors) -> Result<(Option<String>, Option<String>), ExtractError> {
    let reference = first_text(doc, &sel.reference_price);
    let consumption = first_text(doc, &sel.consumption_info);
    if reference.is_none() && consumption.is_none() {
        return Err(ExtractError::Missing {
            what: "price reference block",
        });
    }
    Ok((reference, consumption))
}

/// Every row with two or more cells; a repeated key keeps the last value
fn price_breakdown(doc: &Html, sel: &DetailSelectors) -> IndexMap<String, String> {
    let mut breakdown = IndexMap::new();
    for row in doc.select(&sel.price_rows) {
        let mut cells = row.select(&sel.price_cell);
        if let (Some(key), Some(value)) = (cells.next(), cells.next()) {
            breakdown.insert(inline_text(key), inline_text(value));
        }
    }
    breakdown
}

/// The link directly following the contact heading captioned `caption`
fn contact_link<'d>(doc: &'d Html, sel: &DetailSelectors, caption: &str) -> Option<ElementRef<'d>> {
    doc.select(&sel.provider_block)
        .flat_map(|block| block.select(&sel.contact_heading))
        .filter(|heading| element_text(*heading).contains(caption))
        .find_map(|heading| {
            heading
                .next_siblings()
                .find_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "a")
        })
}

fn provider_phone(doc: &Html, sel: &DetailSelectors) -> Result<String, ExtractError> {
    let phone = contact_link(doc, sel, "Telefon")
        .map(inline_text)
        .filter(|t| !t.is_empty());
    required(phone, "provider phone")
}

fn provider_email(doc: &Html, sel: &DetailSelectors) -> Result<String, ExtractError> {
    let email = contact_link(doc, sel, "E-post")
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| href.strip_prefix("mailto:"))
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty());
    required(email, "provider email")
}

/// Change-contract, terms and supplier website links, by position
fn outbound_links(doc: &Html, sel: &DetailSelectors) -> [Option<String>; 3] {
    let mut hrefs = doc
        .select(&sel.outbound_links)
        .map(|a| a.value().attr("href").map(str::to_string));
    std::array::from_fn(|_| hrefs.next().flatten())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Energy source categories mentioned anywhere on the page
pub fn energy_sources(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    ENERGY_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| title_case(kw))
        .collect()
}

/// Terms derived from trigger words in the page text
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FreeTextTerms {
    pub notice_period: Option<String>,
    pub billing: Option<String>,
    pub payment: Option<String>,
    pub expiry: Option<String>,
}

pub fn free_text_terms(text: &str) -> FreeTextTerms {
    let lower = text.to_lowercase();

    let notice_period = NOTICE_PERIOD
        .captures(&lower)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty());

    let billing = (lower.contains("fakturering") && lower.contains("månadsvis"))
        .then(|| "Månadsvis i efterskott".to_string());

    let payment = ["betalning", "autogiro", "swish"]
        .iter()
        .any(|w| lower.contains(w))
        .then(|| "Autogiro, Swish, Faktura".to_string());

    let expiry = (lower.contains("tillsvidare") || lower.contains("förlängs automatiskt"))
        .then(|| "Övergår till tillsvidare avtal vid utgång".to_string());

    FreeTextTerms {
        notice_period,
        billing,
        payment,
        expiry,
    }
}

pub struct DetailExtractor<'a> {
    timing: &'a Timing,
    selectors: DetailSelectors,
}

impl<'a> DetailExtractor<'a> {
    /// # Errors
    ///
    /// Returns `ExtractError::Selector` if a configured detail selector is invalid.
    pub fn new(config: &ScraperConfig, timing: &'a Timing) -> Result<Self, ExtractError> {
        Ok(Self {
            timing,
            selectors: DetailSelectors::compile(&config.selectors)?,
        })
    }

    /// Load the detail page for `entry` and extract its record.
    ///
    /// # Errors
    ///
    /// Returns `PageError` when the page cannot be loaded or read; field-level
    /// failures never surface here.
    pub async fn extract<P>(
        &self,
        page: &P,
        entry: &ListingEntry,
        combination: &QueryCombination,
    ) -> Result<OfferRecord, PageError>
    where
        P: BrowserPage + ?Sized,
    {
        page.goto(&entry.url, self.timing.navigation_timeout).await?;
        page.settle(self.timing.detail_settle).await;

        let html = page.content().await?;
        let title = page.title().await.unwrap_or_else(|e| {
            debug!("{}: title unavailable: {}", entry.url, e);
            None
        });

        let mut record = self.parse_offer(&html, entry, combination);
        record.title = title;
        info!(
            "  Scraped: {}",
            record.contract_name.as_deref().unwrap_or(&entry.url)
        );
        Ok(record)
    }

    /// Build a record from a rendered detail page; never fails
    pub fn parse_offer(
        &self,
        html: &str,
        entry: &ListingEntry,
        combination: &QueryCombination,
    ) -> OfferRecord {
        let doc = Html::parse_document(html);
        let sel = &self.selectors;
        let mut groups = FieldGroups::new(&entry.url);

        let (contract_type, electrical_area) = groups.attempt("header", header_pair(&doc, sel));
        let contract_name = groups.attempt(
            "contract name",
            required(first_text(&doc, &sel.contract_name), "contract name").map(Some),
        );
        let provider_name = groups.attempt(
            "provider",
            required(first_text(&doc, &sel.provider_name), "provider name").map(Some),
        );
        let (reference_price, consumption_info) =
            groups.attempt("price reference", price_reference(&doc, sel));
        let price_breakdown = price_breakdown(&doc, sel);
        let provider_phone = groups.attempt("phone", provider_phone(&doc, sel).map(Some));
        let provider_email = groups.attempt("email", provider_email(&doc, sel).map(Some));
        let [change_contract_link, terms_link, supplier_website] = outbound_links(&doc, sel);

        let text = body_text(&doc);
        let energy_sources = energy_sources(&text);
        let terms = free_text_terms(&text);

        if !groups.degraded.is_empty() {
            debug!(
                "{}: {} field groups degraded: {}",
                entry.url,
                groups.degraded.len(),
                groups.degraded.join(", ")
            );
        }

        OfferRecord {
            postal_code: combination.target.postal_code.to_string(),
            region: combination.target.region.to_string(),
            town: combination.target.town.to_string(),
            consumption_kwh: combination.consumption.to_string(),
            selected_contract_type: combination.contract.label().to_string(),
            url: entry.url.clone(),
            title: None,
            contract_duration: entry.contract_duration.clone(),
            contract_type,
            electrical_area,
            contract_name,
            provider_name,
            consumption_info,
            reference_price,
            energy_sources,
            price_breakdown,
            notice_period: terms.notice_period,
            billing_options: terms.billing,
            payment_options: terms.payment,
            expiry_info: terms.expiry,
            change_contract_link,
            terms_link,
            supplier_website,
            provider_phone,
            provider_email,
        }
    }
}
