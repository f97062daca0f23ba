use crate::encoder::{Encoded, EventEncoder};
use crate::guard::{self, EmitScope};
use crate::layout::{Layout, PlainLayout};
use crate::record::LogRecord;
use crate::sink::IngestSink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that encodes every event into a JSON document
/// and hands it to an [`IngestSink`] on the emitting thread.
///
/// Span fields of the event's scope (outermost first) and the event's own
/// fields make up the record context that attribute templates are resolved
/// against. There is no queue: each document is sent once, and a failed
/// document is reported and dropped.
pub struct IngestLayer {
    encoder: Arc<EventEncoder>,
    sink: Arc<dyn IngestSink>,
    layout: Arc<dyn Layout>,
    max_level: LevelFilter,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Documents accepted by the sink.
    pub delivered_events: Arc<AtomicU64>,
    /// Documents the sink did not accept.
    pub failed_events: Arc<AtomicU64>,
    /// Records skipped by the encoder and events raised by the pipeline
    /// itself, including the crate's own diagnostics.
    pub skipped_events: Arc<AtomicU64>,
}

impl IngestLayer {
    pub fn new(encoder: EventEncoder, sink: Arc<dyn IngestSink>) -> Self {
        Self {
            encoder: Arc::new(encoder),
            sink,
            layout: Arc::new(PlainLayout),
            max_level: LevelFilter::TRACE,
            total_events: Arc::new(AtomicU64::new(0)),
            delivered_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
            skipped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Arc::new(layout);
        self
    }

    /// Ignore events more verbose than `level`.
    pub fn with_max_level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.max_level = level.into();
        self
    }

    fn forward(&self, record: &LogRecord) {
        let document = match self.encoder.encode(Some(record)) {
            Encoded::Document(document) => document,
            Encoded::Skipped(_) => {
                self.skipped_events.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        // Diagnostics raised while sending must not come back through here.
        let _scope = EmitScope::enter();
        let status = self.sink.send(&document);
        if status.is_success() {
            self.delivered_events.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%status, %document, "cannot send log event");
        }
    }
}

#[derive(Default)]
struct SpanFields(BTreeMap<String, String>);

impl<S> Layer<S> for IngestLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut fields = SpanFields::default();
        let mut message = None;
        attrs.record(&mut FieldVisitor { fields: &mut fields.0, message: &mut message });
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut message = None;
            values.record(&mut FieldVisitor { fields: &mut fields.0, message: &mut message });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }
        // Raised by the pipeline itself: while sending on this thread, or by
        // the HTTP stack on a manager's runtime thread.
        if guard::is_emitting() {
            self.skipped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut context = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    context.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut context, message: &mut message };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level: *meta.level(),
            source: meta.target().to_string(),
            message: self.layout.render(message.as_deref().unwrap_or_default()),
            context,
        };

        self.forward(&record);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, String>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}
