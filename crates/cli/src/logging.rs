//! Diagnostic output on stderr.
//!
//! Events render as `LEVEL: message key=value ...`, with warnings labelled
//! `WARNING:` so recoverable problems stand out in scripts and logs.

use std::fmt;
use std::io::IsTerminal;

use owo_colors::OwoColorize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter that prefixes each line with its level label.
pub struct LevelPrefix;

fn label(level: Level) -> &'static str {
  match level {
    Level::ERROR => "ERROR",
    Level::WARN => "WARNING",
    Level::INFO => "INFO",
    Level::DEBUG => "DEBUG",
    Level::TRACE => "TRACE",
  }
}

impl<S, N> FormatEvent<S, N> for LevelPrefix
where
  S: Subscriber + for<'a> LookupSpan<'a>,
  N: for<'a> FormatFields<'a> + 'static,
{
  fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
    let level = *event.metadata().level();
    let prefix = format!("{}:", label(level));
    if writer.has_ansi_escapes() {
      match level {
        Level::ERROR => write!(writer, "{} ", prefix.red())?,
        Level::WARN => write!(writer, "{} ", prefix.yellow())?,
        _ => write!(writer, "{} ", prefix.dimmed())?,
      }
    } else {
      write!(writer, "{prefix} ")?;
    }
    ctx.field_format().format_fields(writer.by_ref(), event)?;
    writeln!(writer)
  }
}

/// Install the stderr subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn init_tracing(verbose: u8) {
  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .event_format(LevelPrefix)
    .init();
}
