/// Error type returned when building any part of the ingest pipeline.
///
/// These are the only errors the crate surfaces. They are raised while the
/// pipeline is assembled and never while records are being forwarded.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no ingest endpoint URL provided")]
    MissingEndpoint,

    #[error("ingest endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),

    #[error("unsupported ingest endpoint scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("no ingest token provided")]
    MissingToken,

    #[error("ingest token cannot be used in an HTTP header")]
    InvalidToken,

    #[error("attribute with the same name defined: {0}")]
    DuplicateAttribute(String),

    #[error("attribute name must not be empty")]
    EmptyAttributeName,

    #[error("attribute name `{0}` is reserved for the document itself")]
    ReservedAttribute(String),

    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("cannot start ingest runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("invalid value for environment variable {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled,
}
