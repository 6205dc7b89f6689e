use std::future::Future;

use anyhow::Result;
use chrono::Local;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::aggregator::ResultAggregate;
use crate::browser::ChromiumBrowser;
use crate::config::{Config, Timing};
use crate::database::SheetStore;
use crate::discord::DiscordNotifier;
use crate::error::ExtractError;
use crate::extractor::DetailExtractor;
use crate::harvester::ListingHarvester;
use crate::models::{ContractType, QueryCombination};
use crate::output;
use crate::session::SessionDriver;
use crate::traits::{BrowserPage, ScraperConfig, validate_ordinals};

/// Outcome of one sweep over all configured combinations
#[derive(Debug, Default)]
pub struct SweepReport {
    pub aggregate: ResultAggregate,
    pub combinations_run: usize,
    pub combinations_abandoned: usize,
    /// Detail pages that failed to load
    pub records_skipped: usize,
}

/// The session, harvest and extraction stages wired to one site
pub struct Sweep<'a> {
    session: SessionDriver<'a>,
    harvester: ListingHarvester<'a>,
    extractor: DetailExtractor<'a>,
}

impl<'a> Sweep<'a> {
    /// # Errors
    ///
    /// Returns `ExtractError` if a listing or detail selector is invalid.
    pub fn new(site: &'a ScraperConfig, timing: &'a Timing) -> Result<Self, ExtractError> {
        Ok(Self {
            session: SessionDriver::new(site, timing),
            harvester: ListingHarvester::new(site, timing)?,
            extractor: DetailExtractor::new(site, timing)?,
        })
    }

    /// Run every combination in order on `page`.
    ///
    /// A failing combination or detail page is logged and skipped; this never
    /// fails as a whole.
    pub async fn run<P>(&self, page: &P, combinations: &[QueryCombination]) -> SweepReport
    where
        P: BrowserPage + ?Sized,
    {
        let mut report = SweepReport::default();

        for combination in combinations {
            info!("Scraping: {}", combination);
            report.combinations_run += 1;

            if self.session.reach_results(page, combination).await.is_err() {
                report.combinations_abandoned += 1;
                continue;
            }

            let entries = match self.harvester.harvest(page).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to read result list for {}: {}", combination, e);
                    report.combinations_abandoned += 1;
                    continue;
                }
            };

            for entry in &entries {
                match self.extractor.extract(page, entry, combination).await {
                    Ok(record) => report.aggregate.push(record),
                    Err(e) => {
                        warn!("  Error on detail page {}: {}", entry.url, e);
                        report.records_skipped += 1;
                    }
                }
            }

            info!("  Finished: {}", combination);
        }

        report
    }
}

#[derive(Clone)]
pub struct ElprisFinder {
    config: Config,
    site: ScraperConfig,
    store: Option<SheetStore>,
    discord: DiscordNotifier,
}

impl ElprisFinder {
    pub async fn new(config: Config) -> Result<Self> {
        validate_ordinals(&ContractType::ALL, ContractType::ALL.len())?;

        let site = ScraperConfig::elpriskollen();
        // Fail on bad selectors before a browser is launched
        Sweep::new(&site, &config.timing)?;

        let store = match &config.sheet_database_url {
            Some(url) => Some(SheetStore::new(url).await?),
            None => None,
        };
        let discord = DiscordNotifier::with_webhook(config.discord_webhook_url.clone());

        Ok(Self {
            config,
            site,
            store,
            discord,
        })
    }

    pub fn combinations(&self) -> Vec<QueryCombination> {
        QueryCombination::enumerate(
            &self.config.targets,
            &self.config.consumption_levels,
            &self.config.contract_types,
        )
    }

    /// One full sweep: scrape, write output files, upload and notify.
    ///
    /// Only a browser that cannot be launched fails the sweep; everything
    /// after scraping is best effort.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        let combinations = self.combinations();
        let sweep = Sweep::new(&self.site, &self.config.timing)?;
        info!("Starting sweep over {} combinations", combinations.len());

        let browser =
            ChromiumBrowser::launch(self.config.headless, self.config.chrome_path.clone()).await?;
        let page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await.ok();
                return Err(e);
            }
        };

        let report = sweep.run(&page, &combinations).await;

        if let Err(e) = browser.close().await {
            warn!("Browser did not shut down cleanly: {}", e);
        }

        let records = report.aggregate.records();
        if let Err(e) = output::write_outputs(&self.config.output_dir, records) {
            error!("Failed to write output files: {}", e);
        }

        if let Some(store) = &self.store {
            let table = output::flatten(records);
            if let Err(e) = store.append(&table, Local::now()).await {
                error!("Upload to sheet store failed: {}", e);
            }
        }

        if let Err(e) = self.discord.send_summary(&report, &self.config.targets).await {
            error!("Failed to send Discord summary: {}", e);
        }

        info!(
            "ALL DONE! Total records: {} ({} of {} combinations abandoned, {} pages skipped)",
            report.aggregate.len(),
            report.combinations_abandoned,
            report.combinations_run,
            report.records_skipped
        );
        Ok(report)
    }
}

/// Run `sweep` once now, then register it on `sched` for every tick of `schedule`.
///
/// The cron expression is parsed before the first run, so a bad schedule
/// fails without sweeping.
pub async fn schedule_sweeps<F, Fut>(sched: &JobScheduler, schedule: &str, sweep: F) -> Result<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let first = sweep();
    let job = Job::new_async(schedule, move |_uuid, _l| Box::pin(sweep()))?;

    first.await;
    sched.add(job).await?;
    Ok(())
}
