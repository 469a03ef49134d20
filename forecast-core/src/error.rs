use thiserror::Error;

/// Failures the condition pipeline classifies and reports.
///
/// Collaborators (scrapers, HTTP clients, the file store) work with
/// `anyhow::Error` internally; at the pipeline boundary every failure is
/// mapped to one of these variants so the caller knows which stage broke.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The condition taxonomy could not be obtained or was not recognizable.
    #[error("Condition taxonomy unavailable: {reason}")]
    SourceUnavailable { reason: String },

    /// Day or night image bytes for an icon code could not be fetched.
    #[error("Failed to fetch icon '{code}': {reason}")]
    AssetFetchFailed { code: String, reason: String },

    /// Reading or writing a named document failed.
    #[error("Failed to persist document '{document}': {reason}")]
    PersistenceError { document: String, reason: String },
}

impl PipelineError {
    pub fn source_unavailable(err: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable { reason: format!("{err:#}") }
    }

    pub fn asset_fetch(code: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::AssetFetchFailed { code: code.into(), reason: format!("{err:#}") }
    }

    pub fn persistence(document: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::PersistenceError { document: document.into(), reason: format!("{err:#}") }
    }

    /// Icon code this failure is about, for asset failures.
    pub fn icon_code(&self) -> Option<&str> {
        match self {
            Self::AssetFetchFailed { code, .. } => Some(code),
            _ => None,
        }
    }
}
