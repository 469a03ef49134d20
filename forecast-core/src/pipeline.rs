use std::sync::Arc;

use crate::{
    annotate::{annotate, conditions_summary, publish, store_forecast},
    error::PipelineError,
    icons::{IconCache, IconFetcher},
    matcher::MatchPolicy,
    model::Dataset,
    resolver::resolve,
    store::{DocumentStore, IconFileSink},
    taxonomy::{TaxonomySource, TaxonomyTable},
};

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub days: usize,
    pub records: usize,
    /// Records whose condition could not be resolved.
    pub unresolved: usize,
    /// Description -> icon code of conditions seen in the forecast.
    pub resolved: Vec<(String, String)>,
    /// Description -> icon code of taxonomy entries never matched.
    pub missing: Vec<(String, String)>,
    /// Icons that could not be fetched; their records carry no icon.
    pub asset_failures: Vec<PipelineError>,
    /// Image files written by the icon sink, if one is set.
    pub icon_files: usize,
}

impl PipelineReport {
    /// False when some icons were skipped.
    pub fn is_complete(&self) -> bool {
        self.asset_failures.is_empty()
    }
}

/// Canonicalizes forecast conditions and attaches icons.
///
/// Taxonomy and persistence failures abort the run. Icon failures are
/// collected in the report and the run carries on.
pub struct ConditionPipeline {
    taxonomy: Arc<dyn TaxonomySource>,
    fetcher: Arc<dyn IconFetcher>,
    store: Arc<dyn DocumentStore>,
    policy: MatchPolicy,
    concurrency: usize,
    icon_files: Option<IconFileSink>,
}

impl ConditionPipeline {
    pub fn new(
        taxonomy: Arc<dyn TaxonomySource>,
        fetcher: Arc<dyn IconFetcher>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            taxonomy,
            fetcher,
            store,
            policy: MatchPolicy::default(),
            concurrency: crate::icons::DEFAULT_CONCURRENCY,
            icon_files: None,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Also write every fetched icon as day/night image files.
    pub fn with_icon_files(mut self, sink: IconFileSink) -> Self {
        self.icon_files = Some(sink);
        self
    }

    pub async fn run(&self, dataset: &mut Dataset) -> Result<PipelineReport, PipelineError> {
        tracing::info!(days = dataset.days().len(), "Starting condition pipeline");

        store_forecast(self.store.as_ref(), dataset)?;
        let table = TaxonomyTable::load(self.taxonomy.as_ref()).await?;

        let resolution = resolve(dataset, &table, self.policy);

        // Fresh cache per run: icons never leak between invocations.
        let cache = IconCache::new(self.fetcher.clone(), self.concurrency);
        let icons = cache.resolve_icons(&resolution.known_icons()).await;

        annotate(dataset, &icons.icons, &resolution.conditions);
        let summary = conditions_summary(&resolution, &icons.icons);
        publish(self.store.as_ref(), dataset, &summary)?;

        let icon_files = match &self.icon_files {
            Some(sink) => sink.write_icons(&icons.icons)?,
            None => 0,
        };

        let report = PipelineReport {
            days: dataset.days().len(),
            records: dataset.record_count(),
            unresolved: resolution.unresolved,
            resolved: resolution.conditions.into_iter().collect(),
            missing: resolution.missing.into_iter().collect(),
            asset_failures: icons.failures,
            icon_files,
        };

        if report.is_complete() {
            tracing::info!(records = report.records, "Condition pipeline finished");
        } else {
            tracing::warn!(
                records = report.records,
                failed_icons = report.asset_failures.len(),
                "Condition pipeline finished with missing icons"
            );
        }
        Ok(report)
    }
}
