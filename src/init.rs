use crate::attribute::AttributeSpec;
use crate::encoder::EventEncoder;
use crate::error::ConfigError;
use crate::layer::IngestLayer;
use crate::layout::HeaderLayout;
use crate::lookup::Substitutor;
use crate::manager::{ManagerConfig, DEFAULT_TIMEOUT};
use crate::metadata::MetadataFileLookup;
use crate::registry::ManagerRegistry;
use crate::tls::TlsPolicy;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Name under which the manager is registered unless configured otherwise.
pub const DEFAULT_MANAGER_NAME: &str = "log-ingest";

/// Everything needed to wire one ingest pipeline.
///
/// **Fields**
/// - `manager_name`: registry key; pipelines sharing a name share one
///   HTTP client.
/// - `endpoint`: ingest URL, required.
/// - `token`: API token with log ingest permission, required.
/// - `tls_validation`: `false` selects [`TlsPolicy::InsecureTrustAll`].
/// - `attributes`: extra document keys, in output order.
/// - `timeout`: connect and request timeout of a newly created manager.
/// - `max_level`: most verbose level forwarded.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   installed next to the ingest layer, which also makes the crate's own
///   diagnostics visible.
/// - `message_header`: optional fixed header prepended to every message.
/// - `metadata_lookup`: register the `dt` lookup backed by the host
///   metadata file.
#[derive(Clone)]
pub struct IngestConfig {
    pub manager_name: String,
    pub endpoint: String,
    pub token: String,
    pub tls_validation: bool,
    pub attributes: Vec<AttributeSpec>,
    pub timeout: Duration,
    pub max_level: LevelFilter,
    pub enable_stdout: bool,
    pub message_header: Option<String>,
    pub metadata_lookup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            manager_name: DEFAULT_MANAGER_NAME.to_string(),
            endpoint: String::new(),
            token: String::new(),
            tls_validation: true,
            attributes: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max_level: LevelFilter::TRACE,
            enable_stdout: true,
            message_header: None,
            metadata_lookup: false,
        }
    }
}

impl IngestConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("manager_name", &self.manager_name)
            .field("endpoint", &self.endpoint)
            .field("token", &"########")
            .field("tls_validation", &self.tls_validation)
            .field("attributes", &self.attributes)
            .field("timeout", &self.timeout)
            .field("max_level", &self.max_level)
            .field("enable_stdout", &self.enable_stdout)
            .field("message_header", &self.message_header)
            .field("metadata_lookup", &self.metadata_lookup)
            .finish()
    }
}

/// Holds a registry reference to the pipeline's manager. Dropping it (or
/// calling [`shutdown`](IngestGuard::shutdown)) releases that reference.
pub struct IngestGuard {
    registry: Arc<ManagerRegistry>,
    manager_name: String,
    timeout: Duration,
    released: bool,
}

impl IngestGuard {
    pub fn manager_name(&self) -> &str {
        &self.manager_name
    }

    /// Release the manager now and report whether it stopped cleanly.
    pub fn shutdown(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if std::mem::replace(&mut self.released, true) {
            return false;
        }
        self.registry.release(&self.manager_name, self.timeout)
    }
}

impl Drop for IngestGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Validate `config` and build the ingest layer without installing it.
///
/// Attribute names are checked before a manager is requested, so a bad
/// configuration never leaves a registry reference behind.
pub fn build_layer(
    registry: &Arc<ManagerRegistry>,
    config: &IngestConfig,
) -> Result<(IngestLayer, IngestGuard), ConfigError> {
    let mut substitutor = Substitutor::new();
    if config.metadata_lookup {
        substitutor = substitutor.with_lookup("dt", MetadataFileLookup::from_magic_file());
    }
    let encoder = EventEncoder::new(config.attributes.clone(), substitutor)?;

    let manager_config = ManagerConfig::new(
        &config.endpoint,
        config.token.clone(),
        TlsPolicy::from_validation(config.tls_validation),
    )?;
    let manager = registry.get_or_create_with_timeout(&config.manager_name, manager_config, config.timeout)?;

    let guard = IngestGuard {
        registry: Arc::clone(registry),
        manager_name: config.manager_name.clone(),
        timeout: config.timeout,
        released: false,
    };

    let mut layer = IngestLayer::new(encoder, manager).with_max_level(config.max_level);
    if let Some(header) = &config.message_header {
        layer = layer.with_layout(HeaderLayout::new(header.clone()));
    }

    Ok((layer, guard))
}

/// Initialize the global `tracing` subscriber with an ingest layer built
/// from `config`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`IngestLayer`] (and a `fmt`
/// layer when `enable_stdout` is set) as the global default subscriber.
/// Keep the returned guard alive for as long as records should be
/// forwarded.
pub fn init_tracing_with_config(
    registry: &Arc<ManagerRegistry>,
    config: &IngestConfig,
) -> Result<IngestGuard, ConfigError> {
    let (layer, guard) = build_layer(registry, config)?;

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    let installed = if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.map_err(|_| ConfigError::SubscriberInstalled)?;

    Ok(guard)
}

/// Initialize tracing from the `LOG_INGEST_*` environment variables.
///
/// Equivalent to [`IngestConfig::from_env`] followed by
/// [`init_tracing_with_config`].
pub fn init_tracing(registry: &Arc<ManagerRegistry>) -> Result<IngestGuard, ConfigError> {
    let config = IngestConfig::from_env()?;
    init_tracing_with_config(registry, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_attributes_leave_no_manager_behind() {
        let registry = Arc::new(ManagerRegistry::new());
        let mut config = IngestConfig::new("https://ingest.example.com/logs", "token");
        config.attributes = vec![AttributeSpec::literal("a", "1"), AttributeSpec::literal("a", "2")];

        assert!(matches!(build_layer(&registry, &config), Err(ConfigError::DuplicateAttribute(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_endpoint_and_token_are_rejected() {
        let registry = Arc::new(ManagerRegistry::new());
        assert!(matches!(
            build_layer(&registry, &IngestConfig::new("", "token")),
            Err(ConfigError::MissingEndpoint)
        ));
        assert!(matches!(
            build_layer(&registry, &IngestConfig::new("https://ingest.example.com/logs", "")),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn guards_share_and_release_the_manager() {
        let registry = Arc::new(ManagerRegistry::new());
        let config = IngestConfig::new("https://ingest.example.com/logs", "token");

        let (_first_layer, first) = build_layer(&registry, &config).unwrap();
        let (_second_layer, second) = build_layer(&registry, &config).unwrap();
        assert_eq!(registry.managers_created(), 1);

        drop(first);
        assert_eq!(registry.len(), 1);
        assert!(second.shutdown());
        assert!(registry.is_empty());
    }

    #[test]
    fn debug_masks_token() {
        let config = IngestConfig::new("https://ingest.example.com/logs", "secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
