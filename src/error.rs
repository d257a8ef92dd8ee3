use thiserror::Error;

/// Errors raised while configuring or running a search.
///
/// Degenerate candidates (an empty feature mask) and cancellation are not errors:
/// the former is scored with the sentinel value, the latter ends the run with
/// whatever result was already obtained.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Malformed data in {path}: {reason}")]
    MalformedData { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown search mode: {0}")]
    UnknownMode(String),

    #[error("Insufficient data: required {required} samples, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
