// =============================================================================
// Telegram commands — parsing and reply texts
// =============================================================================

use crate::error::SignalError;
use crate::pipeline::ChartRequest;

pub const USAGE_HINT: &str = "Send: /signal BTCUSDT 15m";
pub const FORMAT_HINT: &str = "Format: /signal BTCUSDT 15m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Signal(ChartRequest),
    /// `/signal` with the wrong number of arguments.
    MalformedSignal,
}

/// Parse a chat message. Returns `None` for anything that is not one of our
/// commands. A `@botname` suffix on the command is accepted.
pub fn parse(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head);

    match name {
        "/start" => Some(Command::Start),
        "/signal" => {
            let args: Vec<&str> = parts.collect();
            match args.as_slice() {
                [symbol, interval] => Some(Command::Signal(ChartRequest::new(symbol, interval))),
                _ => Some(Command::MalformedSignal),
            }
        }
        _ => None,
    }
}

pub fn progress_text(req: &ChartRequest) -> String {
    format!("Analyzing {} on {}...", req.symbol, req.interval)
}

pub fn error_text(err: &SignalError) -> String {
    format!("Error [{}]: {}", err.kind(), err)
}
