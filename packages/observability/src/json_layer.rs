//! Tracing layer that renders each event as one JSON object per line.
//!
//! Each entry carries: timestamp (RFC 3339, micros), level, service, pid,
//! target, message, structured fields and the innermost span name.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// A single rendered log event.
#[derive(Debug, Clone, Serialize)]
pub struct JsonlEntry {
    pub timestamp: String,
    pub level: &'static str,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: BTreeMap<String, serde_json::Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.put(field, serde_json::Value::String(rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.put(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, serde_json::Value::String(value.to_string()));
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W> {
    service_name: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonlLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            pid: std::process::id(),
            make_writer,
        }
    }

    fn render<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> JsonlEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        let metadata = event.metadata();

        JsonlEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            level: level_name(*metadata.level()),
            service: self.service_name.clone(),
            pid: self.pid,
            target: metadata.target().to_string(),
            message: collector.message.unwrap_or_default(),
            fields: collector.fields,
            span: ctx.event_span(event).map(|span| span.name().to_string()),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let entry = self.render(event, &ctx);
        if let Ok(line) = serde_json::to_string(&entry) {
            let mut writer = self.make_writer.make_writer();
            let _ = writeln!(writer, "{}", line);
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARN",
        Level::ERROR => "ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonlFileWriter, JsonlWriterFactory};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn entry_omits_empty_fields_and_span() {
        let entry = JsonlEntry {
            timestamp: "2025-06-01T10:30:00.000000Z".to_string(),
            level: "INFO",
            service: "chathook".to_string(),
            pid: 4242,
            target: "webhook_retriable_worker".to_string(),
            message: "delivery succeeded".to_string(),
            fields: BTreeMap::new(),
            span: None,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"service\":\"chathook\""));
        assert!(json.contains("\"pid\":4242"));
        assert!(!json.contains("fields"));
        assert!(!json.contains("span"));
    }

    #[test]
    fn layer_writes_structured_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.jsonl");
        let factory = JsonlWriterFactory::new(JsonlFileWriter::open(&path).unwrap());
        let subscriber =
            tracing_subscriber::registry().with(JsonlLayer::new("chathook".into(), factory));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(source_key = "Nova", attempt = 2u64, "delivery attempt failed");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["message"], "delivery attempt failed");
        assert_eq!(json["fields"]["source_key"], "Nova");
        assert_eq!(json["fields"]["attempt"], 2);
    }
}
