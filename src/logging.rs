//! Tracing setup for hosts and binaries, with log lines stamped by simulation frame.
//!
//! Library code never installs a subscriber; it only emits through `tracing`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use time::macros::format_description;
use time::{format_description::FormatItem, OffsetDateTime};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, FmtSubscriber};

static SUBSCRIBER_INIT: std::sync::Once = std::sync::Once::new();

/// Frames stepped by any scene container in this process.
static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Frame numbers wrap at 16 bits in the log prefix.
const FRAME_DISPLAY_MASK: u64 = 0xFFFF;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

/// Called once per host tick so log lines can be matched to simulation frames.
pub fn record_frame() {
    FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
}

pub fn frame_count() -> u64 {
    FRAME_COUNTER.load(Ordering::Relaxed)
}

/// Formats events as `HH:MM:SS.mmm f0042  INFO span{..}: target: fields`.
pub struct SessionFormatter;

impl<S, N> FormatEvent<S, N> for SessionFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        let timestamp = OffsetDateTime::now_utc().format(&TIMESTAMP_FORMAT).map_err(|_| fmt::Error)?;
        let frame = format!("f{:04X}", frame_count() & FRAME_DISPLAY_MASK);
        write_styled(&mut writer, ansi, "2", format_args!("{timestamp} {frame}"))?;
        writer.write_char(' ')?;

        let (color, label) = level_style(meta.level());
        write_styled(&mut writer, ansi, color, format_args!("{label:>5}"))?;
        writer.write_char(' ')?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write_styled(&mut writer, ansi, "1", format_args!("{}", span.metadata().name()))?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>().filter(|fields| !fields.is_empty()) {
                    write!(writer, "{{{fields}}}")?;
                }
                writer.write_str(": ")?;
            }
        }

        write_styled(&mut writer, ansi, "2", format_args!("{}:", meta.target()))?;
        writer.write_char(' ')?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_style(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::TRACE => ("35", "TRACE"),
        Level::DEBUG => ("34", "DEBUG"),
        Level::INFO => ("32", "INFO"),
        Level::WARN => ("33", "WARN"),
        Level::ERROR => ("31", "ERROR"),
    }
}

/// Writes `args` wrapped in the SGR code `sgr` when the writer supports ANSI.
fn write_styled(writer: &mut Writer<'_>, ansi: bool, sgr: &str, args: fmt::Arguments<'_>) -> fmt::Result {
    if ansi {
        write!(writer, "\x1b[{sgr}m{args}\x1b[0m")
    } else {
        writer.write_fmt(args)
    }
}

/// Configure and initialize logging for a host or binary. Later calls do nothing.
pub fn setup_logging() {
    SUBSCRIBER_INIT.call_once(|| {
        // Allow RUST_LOG to override levels; default to info for our crate and warn elsewhere
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,{name}=info", name = env!("CARGO_CRATE_NAME"))));

        let subscriber = FmtSubscriber::builder()
            .with_ansi(true)
            .with_env_filter(filter)
            .event_format(SessionFormatter)
            .finish()
            .with(ErrorLayer::default());

        if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Could not set global tracing subscriber: {error}");
        }
    });
}
