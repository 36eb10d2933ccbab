use thiserror::Error;

/// Error taxonomy for flacvault. Kinds mirror the job-level error conditions;
/// library errors are wrapped via `#[from]` the way upstream crates surface them.
#[derive(Error, Debug)]
pub enum FlacVaultError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("no audio source found: {0}")]
    NoAudioSource(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("mux failed: {0}")]
    MuxFailed(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("tagging error: {0}")]
    Tagging(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FlacVaultError>;
