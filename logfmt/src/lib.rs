//! A `tracing_subscriber` event formatter that writes
//! [logfmt](https://brandur.org/logfmt)-style output: `key=value` pairs,
//! one line per event, values quoted only when they contain whitespace.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::fmt;
use std::fmt::Write as _;

use observability_deps::tracing::field::{Field, Visit};
use observability_deps::tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// The `tracing_subscriber` event formatter itself. Plugged in via
/// `tracing_subscriber::fmt::Layer::event_format`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFmtFormatter;

impl<S, N> FormatEvent<S, N> for LogFmtFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(writer, "level={} ", level_str(*meta.level()))?;

        {
            let mut visitor = LogFmtVisitor::new(&mut writer);
            event.record(&mut visitor);
            visitor.finish()?;
        }

        write!(writer, " target={}", quote_if_needed(meta.target()))?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, " span={}", quote_if_needed(span.name()))?;
            }
        }

        writeln!(writer)
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Quotes a value if it contains whitespace or an `=`, the way logfmt
/// readers expect ambiguous tokens to be disambiguated.
fn quote_if_needed(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '=' || c == '"') {
        format!("{:?}", value)
    } else {
        value.to_string()
    }
}

struct LogFmtVisitor<'a, 'w> {
    writer: &'a mut Writer<'w>,
    first: bool,
    result: fmt::Result,
}

impl<'a, 'w> LogFmtVisitor<'a, 'w> {
    fn new(writer: &'a mut Writer<'w>) -> Self {
        Self {
            writer,
            first: true,
            result: Ok(()),
        }
    }

    fn write_kv(&mut self, field: &Field, value: impl fmt::Display) {
        if self.result.is_err() {
            return;
        }
        let sep = if self.first { "" } else { " " };
        self.first = false;
        let name = field.name();
        let name = if name == "message" { "msg" } else { name };
        self.result = write!(self.writer, "{sep}{name}={}", quote_if_needed(&value.to_string()));
    }

    fn finish(self) -> fmt::Result {
        self.result
    }
}

impl Visit for LogFmtVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.write_kv(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.write_kv(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.write_kv(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.write_kv(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.write_kv(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_ambiguous() {
        assert_eq!(quote_if_needed("plain"), "plain");
        assert_eq!(quote_if_needed("has space"), "\"has space\"");
        assert_eq!(quote_if_needed("a=b"), "\"a=b\"");
    }

    #[test]
    fn level_names_are_lowercase() {
        assert_eq!(level_str(Level::INFO), "info");
        assert_eq!(level_str(Level::ERROR), "error");
    }
}
