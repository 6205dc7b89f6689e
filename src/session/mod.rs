//! Session driver: walks the comparison wizard for one query combination.
//!
//! The wizard is a linear sequence with one optional branch:
//!
//! ```text
//! Home -> PostalCodeEntered -> ConsumptionEntered -> ContractTypeSelected
//!      -> [FixedPriceDurationSelected] -> ResultsReady
//! ```
//!
//! Any failing step ends the run in `Abandoned`, which only skips the current
//! combination. The cookie banner and the fixed-price duration link are
//! optional UI and never abandon a run.

use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::error::{PageError, SessionError};
use crate::models::QueryCombination;
use crate::traits::{ActionSelector, BrowserPage, Locator, ScraperConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Home,
    PostalCodeEntered,
    ConsumptionEntered,
    ContractTypeSelected,
    FixedPriceDurationSelected,
    ResultsReady,
    Abandoned,
}

/// States visited by a session, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTrace {
    pub visited: Vec<SessionState>,
}

impl SessionTrace {
    fn new() -> Self {
        Self {
            visited: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<SessionState> {
        self.visited.last().copied()
    }

    /// Record a forward transition; the wizard never moves backwards
    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.current().is_none_or(|current| current < next),
            "illegal transition {:?} -> {next:?}",
            self.current()
        );
        debug!("Session state -> {:?}", next);
        self.visited.push(next);
    }

    fn step_error(&self, source: PageError) -> SessionError {
        SessionError::Step {
            state: self.current().unwrap_or(SessionState::Home),
            source,
        }
    }
}

/// A combination that could not reach the results view
#[derive(Debug)]
pub struct Abandoned {
    pub trace: SessionTrace,
    pub error: SessionError,
}

pub struct SessionDriver<'a> {
    config: &'a ScraperConfig,
    timing: &'a Timing,
}

impl<'a> SessionDriver<'a> {
    pub fn new(config: &'a ScraperConfig, timing: &'a Timing) -> Self {
        Self { config, timing }
    }

    /// Drive `page` through the wizard until the result list is rendered.
    ///
    /// # Errors
    ///
    /// Returns [`Abandoned`] with the states reached so far when a required
    /// step fails.
    pub async fn reach_results<P>(
        &self,
        page: &P,
        combination: &QueryCombination,
    ) -> Result<SessionTrace, Abandoned>
    where
        P: BrowserPage + ?Sized,
    {
        let mut trace = SessionTrace::new();
        match self.run_steps(page, combination, &mut trace).await {
            Ok(()) => Ok(trace),
            Err(error) => {
                warn!("Abandoning {}: {}", combination, error);
                trace.advance(SessionState::Abandoned);
                Err(Abandoned { trace, error })
            }
        }
    }

    async fn run_steps<P>(
        &self,
        page: &P,
        combination: &QueryCombination,
        trace: &mut SessionTrace,
    ) -> Result<(), SessionError>
    where
        P: BrowserPage + ?Sized,
    {
        let selectors = &self.config.selectors;
        let timing = self.timing;

        let home = self.config.home_url();
        page.goto(&home, timing.navigation_timeout)
            .await
            .map_err(|source| SessionError::Navigation {
                url: home.clone(),
                source,
            })?;
        page.settle(timing.entry_settle).await;
        trace.advance(SessionState::Home);

        self.dismiss_cookie_banner(page).await;

        let next_page = Locator::css(selectors.next_page.as_str());

        page.fill(&selectors.postal_code_input, combination.target.postal_code)
            .await
            .map_err(|e| trace.step_error(e))?;
        page.click(&next_page).await.map_err(|e| trace.step_error(e))?;
        page.settle(timing.wizard_step_settle).await;
        trace.advance(SessionState::PostalCodeEntered);

        page.fill(&selectors.consumption_input, &combination.consumption.to_string())
            .await
            .map_err(|e| trace.step_error(e))?;
        page.click(&next_page).await.map_err(|e| trace.step_error(e))?;
        page.settle(timing.wizard_step_settle).await;
        trace.advance(SessionState::ConsumptionEntered);

        let contract = combination.contract;
        let contract_button = contract.locator(&selectors.contract_type_buttons);
        page.click_when_visible(&contract_button, timing.contract_wait)
            .await
            .map_err(|source| SessionError::ContractSelector {
                ordinal: contract.ordinal(),
                label: contract.label(),
                source,
            })?;
        page.settle(timing.contract_settle).await;
        trace.advance(SessionState::ContractTypeSelected);

        if contract.is_fixed_price() && self.select_five_year_duration(page).await {
            trace.advance(SessionState::FixedPriceDurationSelected);
        }

        page.settle(timing.pre_continue_settle).await;

        let continue_button = Locator::css(selectors.continue_button.as_str());
        page.click_when_visible(&continue_button, timing.continue_wait)
            .await
            .map_err(|e| trace.step_error(e))?;
        page.settle(timing.results_settle).await;
        trace.advance(SessionState::ResultsReady);

        Ok(())
    }

    /// Best effort: the banner is absent once accepted and may never render
    async fn dismiss_cookie_banner<P>(&self, page: &P)
    where
        P: BrowserPage + ?Sized,
    {
        let selectors = &self.config.selectors;
        let banner = Locator::with_text(
            selectors.cookie_button.as_str(),
            &selectors.cookie_button_text,
        );
        match page.click_when_visible(&banner, self.timing.cookie_wait).await {
            Ok(()) => {
                debug!("Cookie banner dismissed");
                page.settle(self.timing.cookie_settle).await;
            }
            Err(e) => debug!("No cookie banner to dismiss: {}", e),
        }
    }

    /// Best effort: not every fixed-price flow offers a duration choice
    async fn select_five_year_duration<P>(&self, page: &P) -> bool
    where
        P: BrowserPage + ?Sized,
    {
        info!("  FAST PRIS: selecting 5-year duration");
        let five_years = Locator::css(self.config.selectors.fixed_price_five_years.as_str());
        match page
            .click_when_visible(&five_years, self.timing.fixed_price_wait)
            .await
        {
            Ok(()) => {
                page.settle(self.timing.fixed_price_settle).await;
                true
            }
            Err(e) => {
                warn!("  Could not select 5-year duration: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered_along_the_wizard() {
        assert!(SessionState::Home < SessionState::PostalCodeEntered);
        assert!(SessionState::ContractTypeSelected < SessionState::FixedPriceDurationSelected);
        assert!(SessionState::FixedPriceDurationSelected < SessionState::ResultsReady);
        assert!(SessionState::ResultsReady < SessionState::Abandoned);
    }

    #[test]
    fn trace_records_forward_transitions() {
        let mut trace = SessionTrace::new();
        assert_eq!(trace.current(), None);
        trace.advance(SessionState::Home);
        trace.advance(SessionState::PostalCodeEntered);
        trace.advance(SessionState::Abandoned);
        assert_eq!(
            trace.visited,
            vec![
                SessionState::Home,
                SessionState::PostalCodeEntered,
                SessionState::Abandoned
            ]
        );
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    fn trace_rejects_backward_transition() {
        let mut trace = SessionTrace::new();
        trace.advance(SessionState::ConsumptionEntered);
        trace.advance(SessionState::Home);
    }

    #[test]
    fn step_error_names_last_reached_state() {
        let mut trace = SessionTrace::new();
        trace.advance(SessionState::Home);
        let err = trace.step_error(PageError::NotFound {
            locator: "#pcode".to_string(),
        });
        assert!(matches!(
            err,
            SessionError::Step {
                state: SessionState::Home,
                ..
            }
        ));
    }
}
