//! Data models for query combinations, harvested listings, offer records and Discord payloads

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::traits::ActionSelector;

/// One county/town/postal code triple from the target registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoTarget {
    pub region: &'static str,
    pub town: &'static str,
    pub postal_code: &'static str,
}

/// Annual consumption in kWh entered into the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionLevel(pub u32);

impl ConsumptionLevel {
    pub const DEFAULTS: [Self; 3] = [Self(2000), Self(5000), Self(20000)];
}

impl fmt::Display for ConsumptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract type buttons on the wizard's third page.
///
/// The site identifies these by sibling position, so the ordinal is the
/// stable key and the label is only used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractType {
    Kvartspris,
    Timpris,
    RorligtPris,
    MixatPris,
    FastPris,
}

impl ContractType {
    pub const ALL: [Self; 5] = [
        Self::Kvartspris,
        Self::Timpris,
        Self::RorligtPris,
        Self::MixatPris,
        Self::FastPris,
    ];

    /// Fixed-price products ask for a commitment length before continuing
    pub fn is_fixed_price(self) -> bool {
        matches!(self, Self::FastPris)
    }

    /// Accepts either the ordinal (`"5"`) or the label, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(ordinal) = raw.parse::<usize>() {
            return Self::ALL.into_iter().find(|c| c.ordinal() == ordinal);
        }
        let upper = raw.to_uppercase();
        Self::ALL.into_iter().find(|c| c.label() == upper)
    }
}

impl ActionSelector for ContractType {
    fn ordinal(self) -> usize {
        match self {
            Self::Kvartspris => 1,
            Self::Timpris => 2,
            Self::RorligtPris => 3,
            Self::MixatPris => 4,
            Self::FastPris => 5,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Kvartspris => "KVARTSPRIS",
            Self::Timpris => "TIMPRIS",
            Self::RorligtPris => "RÖRLIGT PRIS (MÅNADSBASERAT)",
            Self::MixatPris => "MIXAT PRIS 1 ÅR",
            Self::FastPris => "FAST PRIS",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (target, consumption, contract type) triple, the unit of a session run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCombination {
    pub target: GeoTarget,
    pub consumption: ConsumptionLevel,
    pub contract: ContractType,
}

impl QueryCombination {
    /// Cartesian product in discovery order: target, then consumption, then contract type
    pub fn enumerate(
        targets: &[GeoTarget],
        consumptions: &[ConsumptionLevel],
        contracts: &[ContractType],
    ) -> Vec<Self> {
        let mut combinations = Vec::with_capacity(targets.len() * consumptions.len() * contracts.len());
        for &target in targets {
            for &consumption in consumptions {
                for &contract in contracts {
                    combinations.push(Self {
                        target,
                        consumption,
                        contract,
                    });
                }
            }
        }
        combinations
    }
}

impl fmt::Display for QueryCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) | {} kWh | {}",
            self.target.town, self.target.postal_code, self.consumption, self.contract
        )
    }
}

/// A detail page link harvested from the result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub url: String,
    pub contract_duration: Option<String>,
}

/// A pricing offer scraped from one detail page.
///
/// Everything except `price_breakdown` and `energy_sources` may be absent:
/// a field group that fails to extract leaves its fields empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    #[serde(rename = "scraped_zip_code")]
    pub postal_code: String,
    #[serde(rename = "scraped_county")]
    pub region: String,
    #[serde(rename = "scraped_town")]
    pub town: String,
    #[serde(rename = "scraped_consumption_kwh")]
    pub consumption_kwh: String,
    pub selected_contract_type: String,
    pub url: String,
    pub title: Option<String>,
    pub contract_duration: Option<String>,
    pub contract_type: Option<String>,
    pub electrical_area: Option<String>,
    pub contract_name: Option<String>,
    pub provider_name: Option<String>,
    pub consumption_info: Option<String>,
    #[serde(rename = "jämförpris")]
    pub reference_price: Option<String>,
    pub energy_sources: BTreeSet<String>,
    pub price_breakdown: IndexMap<String, String>,
    pub notice_period: Option<String>,
    pub billing_options: Option<String>,
    pub payment_options: Option<String>,
    pub expiry_info: Option<String>,
    pub change_contract_link: Option<String>,
    pub terms_link: Option<String>,
    pub supplier_website: Option<String>,
    pub provider_phone: Option<String>,
    pub provider_email: Option<String>,
}

/// Discord embed structure for rich notifications
#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<DiscordField>,
}

/// Key-value field for Discord embeds
#[derive(Debug, Serialize)]
pub struct DiscordField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Discord webhook message payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    pub embeds: Vec<DiscordEmbed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCKHOLM: GeoTarget = GeoTarget {
        region: "Stockholm län",
        town: "Stockholm",
        postal_code: "11121",
    };
    const UPPSALA: GeoTarget = GeoTarget {
        region: "Uppsala län",
        town: "Uppsala",
        postal_code: "75310",
    };

    #[test]
    fn contract_type_parses_ordinal_and_label() {
        assert_eq!(ContractType::parse("5"), Some(ContractType::FastPris));
        assert_eq!(ContractType::parse("timpris"), Some(ContractType::Timpris));
        assert_eq!(
            ContractType::parse("rörligt pris (månadsbaserat)"),
            Some(ContractType::RorligtPris)
        );
        assert_eq!(ContractType::parse("6"), None);
        assert_eq!(ContractType::parse("spotpris"), None);
    }

    #[test]
    fn only_fast_pris_is_fixed_price() {
        let fixed: Vec<_> = ContractType::ALL
            .into_iter()
            .filter(|c| c.is_fixed_price())
            .collect();
        assert_eq!(fixed, vec![ContractType::FastPris]);
    }

    #[test]
    fn combinations_follow_target_consumption_contract_order() {
        let combos = QueryCombination::enumerate(
            &[STOCKHOLM, UPPSALA],
            &[ConsumptionLevel(2000), ConsumptionLevel(5000)],
            &[ContractType::Timpris, ContractType::FastPris],
        );

        assert_eq!(combos.len(), 8);
        assert_eq!(combos[0].target, STOCKHOLM);
        assert_eq!(combos[0].consumption, ConsumptionLevel(2000));
        assert_eq!(combos[0].contract, ContractType::Timpris);
        assert_eq!(combos[1].contract, ContractType::FastPris);
        assert_eq!(combos[2].consumption, ConsumptionLevel(5000));
        assert_eq!(combos[4].target, UPPSALA);
    }

    #[test]
    fn record_serializes_with_sheet_field_names() {
        let record = OfferRecord {
            postal_code: "11121".to_string(),
            reference_price: Some("145 öre/kWh".to_string()),
            ..OfferRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["scraped_zip_code"], "11121");
        assert_eq!(json["jämförpris"], "145 öre/kWh");
        assert!(json["price_breakdown"].as_object().unwrap().is_empty());
    }
}
