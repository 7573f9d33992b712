//! Log output setup
//!
//! Lines look like `03-14 15:09:26 bot.thread [INFO] Posted intro: ...`.

use std::fmt;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::application::errors::BotError;

/// `MM-DD HH:MM:SS <logger> [LEVEL] <message>` event format
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFormat;

impl<S, N> FormatEvent<S, N> for LogFormat
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
        write!(
            writer,
            "{} {} [{}] ",
            Local::now().format("%m-%d %H:%M:%S"),
            logger_name(meta.target()),
            meta.level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Dotted logger name for a tracing target
pub fn logger_name(target: &str) -> String {
    target.replace("::", ".")
}

/// Filter directives: our targets, serenity's, then anything from `RUST_LOG`
pub fn filter_directives(debug: bool, debug_discord: bool, extra: Option<&str>) -> String {
    let level = |on: bool, off: &str| if on { "debug".to_string() } else { off.to_string() };
    let mut directives = format!(
        "warn,bot={},escape_roomba={},serenity={}",
        level(debug, "info"),
        level(debug, "info"),
        level(debug_discord, "warn"),
    );
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        directives.push(',');
        directives.push_str(extra);
    }
    directives
}

/// Install the global subscriber; call once at startup
pub fn init(debug: bool, debug_discord: bool) -> Result<(), BotError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directives(debug, debug_discord, rust_log.as_deref()))
        .map_err(|e| BotError::Internal(format!("Bad log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .event_format(LogFormat)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| BotError::Internal(format!("Logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_name() {
        assert_eq!(logger_name("bot.thread"), "bot.thread");
        assert_eq!(logger_name("serenity::gateway::shard"), "serenity.gateway.shard");
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives(false, false, None),
            "warn,bot=info,escape_roomba=info,serenity=warn"
        );
        assert_eq!(
            filter_directives(true, true, Some(" bot.thread=trace ")),
            "warn,bot=debug,escape_roomba=debug,serenity=debug,bot.thread=trace"
        );
        assert!(EnvFilter::try_new(filter_directives(true, false, Some(""))).is_ok());
    }
}
