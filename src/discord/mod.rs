//! # Discord Webhook Integration
//!
//! Posts a summary embed when a sweep finishes, so a scheduled run can be
//! followed without reading its logs.
//!
//! ## Embed Structure
//!
//! - **Title**: "⚡ Elpriskollen sweep finished"
//! - **Description**: the towns and postal codes covered
//! - **Color**: green when every combination reached its results, amber otherwise
//! - **Fields**: records, combinations run/abandoned, detail pages skipped
//! - **Timestamp**: when the sweep finished
//!
//! ## Environment Configuration
//!
//! Set `DISCORD_WEBHOOK_URL` to enable notifications (read into
//! [`Config`](crate::config::Config)). If it is not set, notifications are
//! disabled and a warning is logged once at startup.

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::finder::SweepReport;
use crate::models::{DiscordEmbed, DiscordField, DiscordMessage, GeoTarget};

const COLOR_COMPLETE: u32 = 0x0057_F287;
const COLOR_PARTIAL: u32 = 0x00FE_E75C;

/// Discord webhook client for sweep summaries.
///
/// Cheap to clone: the underlying `reqwest::Client` shares its connection pool.
pub struct DiscordNotifier {
    client: Client,

    /// `DISCORD_WEBHOOK_URL` from the config; `None` turns every send into a no-op
    webhook_url: Option<String>,
}

impl DiscordNotifier {
    pub fn with_webhook(webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            warn!("DISCORD_WEBHOOK_URL not set - Discord notifications will be disabled");
        }

        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Build the summary embed for a finished sweep.
    pub fn summary_message(report: &SweepReport, targets: &[GeoTarget]) -> DiscordMessage {
        let description = targets
            .iter()
            .map(|t| format!("{} ({})", t.town, t.postal_code))
            .collect::<Vec<_>>()
            .join(", ");

        let color = if report.combinations_abandoned == 0 && report.records_skipped == 0 {
            COLOR_COMPLETE
        } else {
            COLOR_PARTIAL
        };

        let field = |name: &str, value: usize| DiscordField {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        };

        DiscordMessage {
            embeds: vec![DiscordEmbed {
                title: "⚡ Elpriskollen sweep finished".to_string(),
                description,
                color,
                timestamp: Utc::now().to_rfc3339(),
                fields: vec![
                    field("Records", report.aggregate.len()),
                    field("Combinations", report.combinations_run),
                    field("Abandoned", report.combinations_abandoned),
                    field("Pages skipped", report.records_skipped),
                ],
            }],
        }
    }

    /// Sends the sweep summary.
    ///
    /// Returns `Ok(())` when Discord is disabled. Network failures are
    /// propagated; a non-success status is logged and otherwise ignored.
    pub async fn send_summary(&self, report: &SweepReport, targets: &[GeoTarget]) -> Result<()> {
        if let Some(webhook_url) = &self.webhook_url {
            let message = Self::summary_message(report, targets);
            let response = self.client.post(webhook_url).json(&message).send().await?;

            if response.status().is_success() {
                info!("Discord summary sent ({} records)", report.aggregate.len());
            } else {
                error!("Failed to send Discord notification: {}", response.status());
            }
        }

        Ok(())
    }
}

impl Clone for DiscordNotifier {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            webhook_url: self.webhook_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ResultAggregate;
    use crate::targets::TARGETS;

    fn report(abandoned: usize) -> SweepReport {
        SweepReport {
            aggregate: ResultAggregate::new(),
            combinations_run: 15,
            combinations_abandoned: abandoned,
            records_skipped: 0,
        }
    }

    #[test]
    fn summary_lists_targets_and_counters() {
        let message = DiscordNotifier::summary_message(&report(0), &TARGETS[..2]);
        let embed = &message.embeds[0];

        assert_eq!(embed.description, "Stockholm (11121), Uppsala (75310)");
        assert_eq!(embed.color, COLOR_COMPLETE);
        let combos = embed.fields.iter().find(|f| f.name == "Combinations").unwrap();
        assert_eq!(combos.value, "15");
    }

    #[test]
    fn abandoned_combinations_mark_summary_partial() {
        let message = DiscordNotifier::summary_message(&report(2), &TARGETS[..1]);
        assert_eq!(message.embeds[0].color, COLOR_PARTIAL);
    }

    #[tokio::test]
    async fn disabled_notifier_is_a_no_op() {
        let notifier = DiscordNotifier::with_webhook(None);
        assert!(notifier.send_summary(&report(0), &TARGETS[..1]).await.is_ok());
    }
}
