//! Output sink: lossless JSON and a flattened CSV projection of the aggregate.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use tracing::info;

use crate::models::OfferRecord;

pub const JSON_FILE: &str = "combined_output.json";
pub const CSV_FILE: &str = "combined_output.csv";

const PRICE_PREFIX: &str = "price_";

/// Fixed columns of the flattened projection, in record order
const BASE_COLUMNS: [&str; 24] = [
    "scraped_zip_code",
    "scraped_county",
    "scraped_town",
    "scraped_consumption_kwh",
    "selected_contract_type",
    "url",
    "title",
    "contract_duration",
    "contract_type",
    "electrical_area",
    "contract_name",
    "provider_name",
    "consumption_info",
    "jämförpris",
    "notice_period",
    "billing_options",
    "payment_options",
    "expiry_info",
    "change_contract_link",
    "terms_link",
    "supplier_website",
    "provider_phone",
    "provider_email",
    "energy_sources",
];

/// A header row plus string cells; absent values are empty strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column name for a price breakdown key
pub fn price_column(key: &str) -> String {
    format!("{PRICE_PREFIX}{}", key.replace([' ', '/'], "_"))
}

fn base_cells(record: &OfferRecord) -> [String; 24] {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        record.postal_code.clone(),
        record.region.clone(),
        record.town.clone(),
        record.consumption_kwh.clone(),
        record.selected_contract_type.clone(),
        record.url.clone(),
        opt(&record.title),
        opt(&record.contract_duration),
        opt(&record.contract_type),
        opt(&record.electrical_area),
        opt(&record.contract_name),
        opt(&record.provider_name),
        opt(&record.consumption_info),
        opt(&record.reference_price),
        opt(&record.notice_period),
        opt(&record.billing_options),
        opt(&record.payment_options),
        opt(&record.expiry_info),
        opt(&record.change_contract_link),
        opt(&record.terms_link),
        opt(&record.supplier_website),
        opt(&record.provider_phone),
        opt(&record.provider_email),
        record
            .energy_sources
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("; "),
    ]
}

/// Flatten records into one table.
///
/// Every distinct price breakdown key seen across all records becomes a
/// `price_` column, in first-seen order, after the fixed columns.
pub fn flatten(records: &[OfferRecord]) -> FlatTable {
    let price_columns: IndexSet<String> = records
        .iter()
        .flat_map(|r| r.price_breakdown.keys())
        .map(|k| price_column(k))
        .collect();

    let headers = BASE_COLUMNS
        .iter()
        .map(|c| (*c).to_string())
        .chain(price_columns.iter().cloned())
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            let mut prices = vec![String::new(); price_columns.len()];
            for (key, value) in &record.price_breakdown {
                if let Some(index) = price_columns.get_index_of(&price_column(key)) {
                    prices[index].clone_from(value);
                }
            }
            base_cells(record).into_iter().chain(prices).collect()
        })
        .collect();

    FlatTable { headers, rows }
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

/// Render a table as RFC 4180 CSV
pub fn to_csv_string(table: &FlatTable) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_row(&mut out, &table.headers);
    for row in &table.rows {
        let _ = write_row(&mut out, row);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

/// Paths written by [`write_outputs`]
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Write the JSON and CSV files into `dir`, replacing earlier runs
pub fn write_outputs(dir: &Path, records: &[OfferRecord]) -> Result<WrittenOutputs> {
    ensure_directory(dir)?;

    let json = dir.join(JSON_FILE);
    let file = File::create(&json).with_context(|| format!("creating {}", json.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;

    let csv = dir.join(CSV_FILE);
    fs::write(&csv, to_csv_string(&flatten(records)))
        .with_context(|| format!("writing {}", csv.display()))?;

    info!("Saved {} records → JSON + CSV", records.len());
    Ok(WrittenOutputs { json, csv })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(url: &str, prices: &[(&str, &str)], sources: &[&str]) -> OfferRecord {
        OfferRecord {
            url: url.to_string(),
            provider_name: Some("Provider A".to_string()),
            price_breakdown: prices
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            energy_sources: sources.iter().map(|s| (*s).to_string()).collect::<BTreeSet<_>>(),
            ..OfferRecord::default()
        }
    }

    #[test]
    fn price_column_replaces_spaces_and_slashes() {
        assert_eq!(price_column("Elpris kr/kWh"), "price_Elpris_kr_kWh");
    }

    #[test]
    fn flatten_expands_union_of_price_keys() {
        let records = [
            record("a", &[("Elpris", "0.50"), ("Påslag", "0.05")], &["Vind", "Vatten"]),
            record("b", &[("Månadsavgift", "39 kr"), ("Elpris", "0.60")], &[]),
        ];

        let table = flatten(&records);

        let price_headers: Vec<_> = table.headers[BASE_COLUMNS.len()..].to_vec();
        assert_eq!(
            price_headers,
            vec!["price_Elpris", "price_Påslag", "price_Månadsavgift"]
        );
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r.len() == table.headers.len()));

        let base = BASE_COLUMNS.len();
        assert_eq!(table.rows[0][base..], ["0.50", "0.05", ""]);
        assert_eq!(table.rows[1][base..], ["0.60", "", "39 kr"]);

        let sources = BASE_COLUMNS.iter().position(|c| *c == "energy_sources").unwrap();
        assert_eq!(table.rows[0][sources], "Vatten; Vind");
        assert_eq!(table.rows[1][sources], "");
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        let table = FlatTable {
            headers: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["Autogiro, Swish".to_string(), "say \"hi\"".to_string()]],
        };
        assert_eq!(
            to_csv_string(&table),
            "a,b\n\"Autogiro, Swish\",\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn write_outputs_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("runs");
        let records = [record("a", &[("Elpris", "0.50")], &["Vind"])];

        let written = write_outputs(&out, &records).unwrap();

        let json: Vec<OfferRecord> =
            serde_json::from_str(&fs::read_to_string(&written.json).unwrap()).unwrap();
        assert_eq!(json, records);
        let csv = fs::read_to_string(&written.csv).unwrap();
        assert!(csv.starts_with("scraped_zip_code,"));
        assert!(csv.lines().next().unwrap().ends_with(",price_Elpris"));
        assert_eq!(csv.lines().count(), 2);
    }
}
