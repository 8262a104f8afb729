use std::path::PathBuf;
use thiserror::Error;

/// Errors from the external data providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("season {0} is not available from the data source")]
    UnsupportedSeason(u16),

    #[error("no results recorded for {season} round {round}")]
    EmptySession { season: u16, round: u32 },

    #[error("no event named {name:?} in the {season} schedule")]
    UnknownEvent { season: u16, name: String },
}

/// Errors from the dataset/training/prediction pipeline
///
/// Provider failures carry the season/event/stage context they occurred in,
/// so a caller can diagnose a failed build without retrying blindly.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },

    #[error("training failed: {0}")]
    Training(String),

    #[error("no trained model at {}; train the model first", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("feature width mismatch: transformer produced {produced} columns, classifier expects {expected}")]
    FeatureShape { produced: usize, expected: usize },

    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap a provider failure with the stage it happened in
    pub fn provider(context: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_keeps_context() {
        let err = PipelineError::provider(
            "session results for 2023 Monaco Grand Prix",
            ProviderError::EmptySession {
                season: 2023,
                round: 6,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("2023 Monaco Grand Prix"));
        assert!(msg.contains("round 6"));
    }

    #[test]
    fn test_model_not_found_hints_at_training() {
        let err = PipelineError::ModelNotFound {
            path: PathBuf::from("models/top10_logreg.json"),
        };
        assert!(err.to_string().contains("train the model first"));
    }
}
