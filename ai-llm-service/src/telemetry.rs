use std::io::{self, IsTerminal};
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Targets of the workspace crates; events from anything else are dropped by [`layer`].
pub const WORKSPACE_TARGETS: &[&str] = &[
    "ai_llm_service",
    "rag_store",
    "contextor",
    "api",
    "docqa_backend",
];

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

fn is_workspace_target(target: &str) -> bool {
    WORKSPACE_TARGETS.iter().any(|p| {
        target == *p || target.strip_prefix(p).is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Formatting layer that renders only events emitted by the workspace crates.
///
/// - RFC3339 UTC timestamps
/// - Compact single-line format with `file:line`
/// - Span close events (duration of instrumented functions)
/// - ANSI colors only when stdout is a terminal
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();
    let only_workspace = filter::filter_fn(|meta| is_workspace_target(meta.target()));

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(only_workspace)
}

/// Level directives (`crate=level`) for every workspace crate.
pub fn level_directives(level: Level) -> Vec<Directive> {
    let level = level.as_str().to_lowercase();
    WORKSPACE_TARGETS
        .iter()
        .filter_map(|t| Directive::from_str(&format!("{t}={level}")).ok())
        .collect()
}

/// `RUST_LOG` if set (else `default`), plus `level` for the workspace crates.
///
/// With `default = "warn"` and `Level::DEBUG` third-party crates log at WARN
/// while this workspace logs at DEBUG.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    level_directives(level)
        .into_iter()
        .fold(base, |f, d| f.add_directive(d))
}

/// Parses `LOG_LEVEL`-style strings, defaulting to INFO.
pub fn parse_level(raw: Option<&str>) -> Level {
    raw.and_then(|s| Level::from_str(s.trim()).ok())
        .unwrap_or(Level::INFO)
}
