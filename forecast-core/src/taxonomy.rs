use std::collections::HashSet;

use async_trait::async_trait;

use crate::{error::PipelineError, model::TaxonomyEntry};

/// Anything that can produce the raw condition table, e.g. a scraped web page.
#[async_trait]
pub trait TaxonomySource: Send + Sync {
    async fn scrape_taxonomy(&self) -> anyhow::Result<Vec<TaxonomyEntry>>;
}

/// Snapshot of the canonical condition table for one pipeline run.
///
/// Entry order is the source's order and is what tie-breaking in the
/// matcher relies on. Icon codes are unique within a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyTable {
    entries: Vec<TaxonomyEntry>,
}

impl TaxonomyTable {
    /// Pull a fresh snapshot from `source`.
    pub async fn load(source: &dyn TaxonomySource) -> Result<Self, PipelineError> {
        let raw = source.scrape_taxonomy().await.map_err(PipelineError::source_unavailable)?;
        let table = Self::from_entries(raw)?;
        tracing::info!(entries = table.len(), "Loaded condition taxonomy");
        Ok(table)
    }

    /// Validate raw rows: codes must be three characters, later duplicates
    /// of an already seen code are dropped.
    pub fn from_entries(raw: Vec<TaxonomyEntry>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(raw.len());

        for entry in raw {
            if entry.icon_code.chars().count() != 3 {
                return Err(PipelineError::SourceUnavailable {
                    reason: format!(
                        "unrecognized icon code '{}' for '{}'",
                        entry.icon_code, entry.description
                    ),
                });
            }
            if !seen.insert(entry.icon_code.clone()) {
                tracing::warn!(
                    icon_code = %entry.icon_code,
                    description = %entry.description,
                    "Dropping duplicate icon code from taxonomy"
                );
                continue;
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptions in table order, duplicates included.
    pub fn descriptions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.description.as_str()).collect()
    }

    /// Icon code of the first entry carrying `description`.
    pub fn icon_code_of(&self, description: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.description == description)
            .map(|e| e.icon_code.as_str())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct StaticSource(pub Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl TaxonomySource for StaticSource {
        async fn scrape_taxonomy(&self) -> anyhow::Result<Vec<TaxonomyEntry>> {
            Ok(self.0.iter().map(|(c, d)| TaxonomyEntry::new(*c, *d)).collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl TaxonomySource for BrokenSource {
        async fn scrape_taxonomy(&self) -> anyhow::Result<Vec<TaxonomyEntry>> {
            anyhow::bail!("table element not found")
        }
    }

    #[tokio::test]
    async fn load_keeps_source_order() {
        let source = StaticSource(vec![("02d", "Few Clouds"), ("01d", "Clear Sky")]);
        let table = TaxonomyTable::load(&source).await.unwrap();

        assert_eq!(table.descriptions(), vec!["Few Clouds", "Clear Sky"]);
        assert_eq!(table.icon_code_of("Clear Sky"), Some("01d"));
    }

    #[tokio::test]
    async fn load_maps_source_errors_to_source_unavailable() {
        let err = TaxonomyTable::load(&BrokenSource).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("table element not found"));
    }

    #[test]
    fn malformed_codes_are_rejected() {
        let err = TaxonomyTable::from_entries(vec![TaxonomyEntry::new("1", "Clear Sky")])
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn duplicate_codes_keep_first_occurrence() {
        let table = TaxonomyTable::from_entries(vec![
            TaxonomyEntry::new("01d", "Clear Sky"),
            TaxonomyEntry::new("01d", "Sunny"),
        ])
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].description, "Clear Sky");
    }

    #[test]
    fn shared_description_resolves_to_first_code() {
        let table = TaxonomyTable::from_entries(vec![
            TaxonomyEntry::new("09d", "Rain"),
            TaxonomyEntry::new("10d", "Rain"),
        ])
        .unwrap();
        assert_eq!(table.icon_code_of("Rain"), Some("09d"));
    }
}
