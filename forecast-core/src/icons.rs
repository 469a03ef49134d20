use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::OnceCell;

use crate::{
    error::PipelineError,
    model::{IconPayload, night_variant},
};

/// Default number of icon codes fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Downloads the image for one icon code (`"01d"`, `"01n"`, ...).
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch_icon_bytes(&self, icon_code: &str) -> anyhow::Result<Vec<u8>>;
}

/// Result of resolving a set of icon codes.
#[derive(Debug, Default)]
pub struct IconResolution {
    /// Icon code -> payload, for every code that fetched successfully.
    pub icons: BTreeMap<String, IconPayload>,
    /// One `AssetFetchFailed` per code that could not be fetched, by code.
    pub failures: Vec<PipelineError>,
}

impl IconResolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_codes(&self) -> Vec<&str> {
        self.failures.iter().filter_map(PipelineError::icon_code).collect()
    }
}

/// Per-run cache of icon bytes in front of an [`IconFetcher`].
///
/// Each fetch code (day or night) is downloaded at most once per cache,
/// including when several tasks ask for it at the same time. Failed
/// downloads are not cached.
pub struct IconCache {
    fetcher: Arc<dyn IconFetcher>,
    concurrency: usize,
    slots: Mutex<HashMap<String, Arc<OnceCell<Vec<u8>>>>>,
}

impl IconCache {
    pub fn new(fetcher: Arc<dyn IconFetcher>, concurrency: usize) -> Self {
        Self { fetcher, concurrency: concurrency.max(1), slots: Mutex::new(HashMap::new()) }
    }

    async fn bytes(&self, fetch_code: &str) -> anyhow::Result<Vec<u8>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(fetch_code.to_string()).or_default().clone()
        };

        let bytes = slot
            .get_or_try_init(move || async move {
                tracing::debug!(icon_code = fetch_code, "Fetching icon");
                self.fetcher.fetch_icon_bytes(fetch_code).await
            })
            .await?;

        Ok(bytes.clone())
    }

    /// Day and night bytes for `icon_code`.
    pub async fn payload(
        &self,
        icon_code: &str,
        description: &str,
    ) -> Result<IconPayload, PipelineError> {
        let day_bytes =
            self.bytes(icon_code).await.map_err(|e| PipelineError::asset_fetch(icon_code, e))?;
        let night_bytes = self
            .bytes(&night_variant(icon_code))
            .await
            .map_err(|e| PipelineError::asset_fetch(icon_code, e))?;

        Ok(IconPayload {
            description: description.to_string(),
            icon_code: icon_code.to_string(),
            day_bytes,
            night_bytes,
        })
    }

    /// Resolve every code in `wanted` (icon code -> description).
    ///
    /// A failing code is reported in `failures` and skipped; the other
    /// codes still resolve.
    pub async fn resolve_icons(&self, wanted: &BTreeMap<String, String>) -> IconResolution {
        let results: Vec<_> = stream::iter(wanted)
            .map(move |(code, description)| async move {
                (code, self.payload(code, description).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut resolution = IconResolution::default();
        for (code, result) in results {
            match result {
                Ok(payload) => {
                    resolution.icons.insert(code.clone(), payload);
                }
                Err(err) => {
                    tracing::warn!(icon_code = %code, error = %err, "Icon unavailable");
                    resolution.failures.push(err);
                }
            }
        }
        resolution.failures.sort_by(|a, b| a.icon_code().cmp(&b.icon_code()));

        tracing::info!(
            fetched = resolution.icons.len(),
            failed = resolution.failures.len(),
            "Resolved condition icons"
        );
        resolution
    }
}
