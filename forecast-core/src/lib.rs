//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - The condition pipeline: taxonomy snapshot, fuzzy matching, resolution,
//!   icon caching and document annotation
//! - The hourly temperature archive document
//! - Capability traits for its collaborators (taxonomy source, icon fetcher,
//!   document store, location lookup) and their HTTP/file implementations
//! - Configuration & credentials handling
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod annotate;
pub mod config;
pub mod error;
pub mod history;
pub mod icons;
pub mod location;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod taxonomy;

pub use config::{Config, IconConfig, ProviderConfig};
pub use error::PipelineError;
pub use icons::{IconCache, IconFetcher, IconResolution};
pub use location::LocationResolver;
pub use matcher::{ConditionMatch, MatchPolicy, best_match};
pub use model::{
    Dataset, DayIcon, DayRecord, HistoryRecord, HourlyRecord, IconPayload, TaxonomyEntry,
    WeatherReport,
};
pub use pipeline::{ConditionPipeline, PipelineReport};
pub use provider::ProviderId;
pub use resolver::{ConditionIndex, MissingIndex, Resolution, resolve};
pub use store::{DocumentStore, IconFileSink, JsonFileStore};
pub use taxonomy::{TaxonomySource, TaxonomyTable};
