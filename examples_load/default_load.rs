use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::error;
use tracing_log_ingest::layer::IngestLayer;
use tracing_log_ingest::lookup::Substitutor;
use tracing_log_ingest::noop_sink::NoopSink;
use tracing_log_ingest::{AttributeSpec, EventEncoder};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn main() {
    let encoder = EventEncoder::new(
        vec![
            AttributeSpec::literal("service", "load-test"),
            AttributeSpec::new("iteration", "${iteration}"),
        ],
        Substitutor::new(),
    )
    .expect("valid attributes");
    let layer = IngestLayer::new(encoder, Arc::new(NoopSink));
    let delivered = Arc::clone(&layer.delivered_events);

    tracing::subscriber::set_global_default(Registry::default().with(layer)).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("encoded {} events in {:?} (~{:.0} ev/s), delivered {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        delivered.load(Ordering::Relaxed)
    );
}
