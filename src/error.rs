use thiserror::Error;

use crate::session::SessionState;

/// Failures raised by a [`BrowserPage`](crate::traits::BrowserPage) implementation.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{action} timed out after {after_ms}ms")]
    Timeout { action: String, after_ms: u64 },

    #[error("no element matches {locator}")]
    NotFound { locator: String },

    #[error("browser error: {0}")]
    Browser(String),
}

/// Failures that abandon one query combination.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: PageError,
    },

    #[error("wizard step after {state:?} failed: {source}")]
    Step {
        state: SessionState,
        #[source]
        source: PageError,
    },

    #[error("contract type selector #{ordinal} ({label}) unavailable: {source}")]
    ContractSelector {
        ordinal: usize,
        label: &'static str,
        #[source]
        source: PageError,
    },
}

/// Failure of a single field group on a detail page.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{what} not present on page")]
    Missing { what: &'static str },

    #[error("invalid selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid site origin {url}: {reason}")]
    BaseUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid ordinal table: {0}")]
    OrdinalTable(String),
}
