pub mod record;
pub mod status;
pub mod error;
pub mod sink;
pub mod layer;
pub mod layout;

pub mod attribute;
pub mod lookup;
pub mod metadata;
pub mod guard;
pub mod encoder;

pub mod tls;
pub mod manager;
pub mod registry;

pub mod env;
pub mod init;
pub mod noop_sink;

pub use attribute::AttributeSpec;
pub use encoder::{Encoded, EventEncoder, SkipReason};
pub use error::ConfigError;
pub use manager::{IngestManager, ManagerConfig, ManagerState};
pub use registry::ManagerRegistry;
pub use sink::IngestSink;
pub use status::Status;
pub use tls::TlsPolicy;
