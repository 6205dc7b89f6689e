//! Append-only collection of offer records in discovery order.

use crate::models::OfferRecord;

/// Records from every combination of a sweep.
///
/// Order is target, consumption, contract type, then listing order. Nothing
/// is deduplicated: the same offer legitimately repeats across consumption
/// levels.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregate {
    records: Vec<OfferRecord>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: OfferRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OfferRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> OfferRecord {
        OfferRecord {
            url: url.to_string(),
            ..OfferRecord::default()
        }
    }

    #[test]
    fn keeps_insertion_order_and_duplicates() {
        let mut aggregate = ResultAggregate::new();
        aggregate.push(record("https://elpriskollen.se/a"));
        aggregate.push(record("https://elpriskollen.se/b"));
        aggregate.push(record("https://elpriskollen.se/a"));

        let urls: Vec<_> = aggregate.records().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://elpriskollen.se/a",
                "https://elpriskollen.se/b",
                "https://elpriskollen.se/a"
            ]
        );
        assert_eq!(aggregate.len(), 3);
    }
}
