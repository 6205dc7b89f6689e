pub mod aggregator;
pub mod browser;
pub mod config;
pub mod database;
pub mod discord;
pub mod error;
pub mod extractor;
pub mod finder;
pub mod harvester;
mod html;
pub mod models;
pub mod output;
pub mod session;
pub mod targets;
pub mod traits;

pub use aggregator::ResultAggregate;
pub use config::{Config, Timing};
pub use error::{ConfigError, ExtractError, PageError, SessionError};
pub use finder::{ElprisFinder, Sweep, SweepReport};
pub use models::{ContractType, ConsumptionLevel, GeoTarget, ListingEntry, OfferRecord, QueryCombination};
pub use traits::{ActionSelector, BrowserPage, Locator, ScraperConfig};
