//! Tracing subscriber and panic hook setup.
//!
//! The engine only emits `tracing` events. Hosts that have no subscriber of
//! their own can call [`install_tracing`] and [`install_panic_hook`] once at
//! startup; both are idempotent.

use std::backtrace::Backtrace;
use std::io::{self, Write};
use std::panic::{self, PanicHookInfo};
use std::sync::Once;
use std::thread;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{self, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

const TRACING_PREFIX: &str = "[canopy::tracing]";
const DEFAULT_FILTER: &str = "info";
const MAX_PANIC_LINES: usize = 8;

static PANIC_HOOK_INSTALLED: Once = Once::new();
static TRACING_INSTALLED: Once = Once::new();

/// Install a stderr subscriber filtered by `RUST_LOG` (idempotent).
pub fn install_tracing() {
    TRACING_INSTALLED.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let console = fmt::layer()
            .event_format(PanicAwareFormatter)
            .with_writer(PrefixedWriter)
            .with_ansi(false)
            .with_filter(filter);

        // Another subscriber may already be installed by the host or a test.
        let _ = tracing_subscriber::registry().with(console).try_init();
    });
}

/// Forward panics to `tracing` before the previous hook runs (idempotent).
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            previous(info);
        }));
    });
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let message = canopy_core::error::panic_message(info.payload());
    let thread_name = thread::current().name().unwrap_or("unnamed").to_string();
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_default();
    let backtrace = Backtrace::force_capture().to_string();

    tracing::error!(
        target: "canopy::panic",
        message = %message,
        thread = %thread_name,
        location = %location,
        backtrace = %backtrace
    );
}

/// First `max` lines of `text`, plus whether anything was cut.
fn truncated_lines(text: &str, max: usize) -> (Vec<&str>, bool) {
    let lines = text.lines().take(max).collect::<Vec<_>>();
    let truncated = text.lines().nth(max).is_some();
    (lines, truncated)
}

#[derive(Clone, Default)]
struct PrefixedWriter;

impl<'a> MakeWriter<'a> for PrefixedWriter {
    type Writer = PrefixedWriterInner<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        PrefixedWriterInner {
            inner: io::stderr(),
            wrote_prefix: false,
        }
    }
}

struct PrefixedWriterInner<W> {
    inner: W,
    wrote_prefix: bool,
}

impl<W: Write> Write for PrefixedWriterInner<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_prefix {
            self.inner.write_all(TRACING_PREFIX.as_bytes())?;
            self.inner.write_all(b" ")?;
            self.wrote_prefix = true;
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Clone, Copy, Default)]
struct PanicAwareFormatter;

impl<S, N> FormatEvent<S, N> for PanicAwareFormatter
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let target = event.metadata().target();

        if target == "canopy::panic" {
            let mut visitor = PanicFieldVisitor::default();
            event.record(&mut visitor);

            let msg = visitor.message.as_deref().unwrap_or("panic");
            write!(writer, "PANIC: {msg}")?;
            if let Some(location) = visitor.location.as_deref().filter(|l| !l.is_empty()) {
                write!(writer, " at {location}")?;
            }

            if let Some(bt) = visitor.backtrace.as_deref() {
                let (lines, truncated) = truncated_lines(bt, MAX_PANIC_LINES);
                write!(writer, "\nStack:")?;
                for line in lines {
                    write!(writer, "\n  {line}")?;
                }
                if truncated {
                    write!(writer, "\n  ... (truncated)")?;
                }
            }
            writeln!(writer)
        } else {
            let level = event.metadata().level();
            write!(writer, "{level} {target}: ")?;
            ctx.field_format().format_fields(writer.by_ref(), event)?;
            writeln!(writer)
        }
    }
}

#[derive(Default)]
struct PanicFieldVisitor {
    message: Option<String>,
    location: Option<String>,
    backtrace: Option<String>,
}

impl PanicFieldVisitor {
    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "message" => Some(&mut self.message),
            "location" => Some(&mut self.location),
            "backtrace" => Some(&mut self.backtrace),
            _ => None,
        }
    }
}

impl tracing::field::Visit for PanicFieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if let Some(slot) = self.slot(field.name()) {
            *slot = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if let Some(slot) = self.slot(field.name()) {
            *slot = Some(value.to_string());
        }
    }
}
