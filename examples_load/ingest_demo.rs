use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn};
use tracing_log_ingest::init::init_tracing;
use tracing_log_ingest::ManagerRegistry;

/// Emits a few records per second to the endpoint configured through the
/// `LOG_INGEST_*` environment variables, e.g.
///
/// ```text
/// LOG_INGEST_URL=https://ingest.example.com/api/v2/logs/ingest \
/// LOG_INGEST_TOKEN=... \
/// LOG_INGEST_ATTRIBUTES='service=demo,trace=${otel:trace_id}' \
/// cargo run --example ingest_demo
/// ```
#[tokio::main]
async fn main() {
    let registry = Arc::new(ManagerRegistry::new());
    let guard = match init_tracing(&registry) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cannot initialize log ingest: {e}");
            std::process::exit(1);
        }
    };

    for i in 0..10u32 {
        let span = info_span!("tick", trace_id = format!("{:032x}", i).as_str(), iteration = i);
        span.in_scope(|| {
            if i % 3 == 0 {
                warn!(iteration = i, "slow tick");
            } else {
                info!(iteration = i, "tick");
            }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    guard.shutdown();
    registry.shutdown(Duration::from_secs(5));
}
