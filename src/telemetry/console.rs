//! Console capture: `log`, `warn` and `error` are forwarded as
//! `CONSOLE_OUTPUT` after the original method has run.

use crate::config::BridgeConfig;
use crate::protocol::{ConsoleLevel, Outbound};
use crate::serializer::{serialize, Inspect, SerializedValue};

/// Console methods that are wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMethod {
    Log,
    Warn,
    Error,
}

impl ConsoleMethod {
    pub const ALL: [ConsoleMethod; 3] = [ConsoleMethod::Log, ConsoleMethod::Warn, ConsoleMethod::Error];

    /// Property name on `console`.
    pub fn name(self) -> &'static str {
        match self {
            ConsoleMethod::Log => "log",
            ConsoleMethod::Warn => "warn",
            ConsoleMethod::Error => "error",
        }
    }

    pub fn level(self) -> ConsoleLevel {
        match self {
            ConsoleMethod::Log => ConsoleLevel::Info,
            ConsoleMethod::Warn => ConsoleLevel::Warning,
            ConsoleMethod::Error => ConsoleLevel::Error,
        }
    }

    /// Warnings and errors carry the caller's stack.
    pub fn captures_stack(self) -> bool {
        !matches!(self, ConsoleMethod::Log)
    }
}

/// Drop the first `skip` lines of a stack trace (the `Error` header and the
/// wrapper's own frame).
pub fn trim_stack(stack: &str, skip: usize) -> String {
    stack.split('\n').skip(skip).collect::<Vec<_>>().join("\n")
}

/// Build the `CONSOLE_OUTPUT` message for one call.
///
/// `raw_stack` is the stack of an `Error` created inside the wrapper; it is
/// ignored for `log`.
pub fn capture<V: Inspect>(
    config: &BridgeConfig,
    method: ConsoleMethod,
    args: &[V],
    raw_stack: Option<&str>,
    logged_at: String,
) -> Outbound {
    let serializer = config.console_serializer();
    let raw: Vec<SerializedValue> = args.iter().map(|arg| serialize(arg, &serializer)).collect();

    let mut message = raw
        .iter()
        .map(|value| value.to_display(serializer.indent))
        .collect::<Vec<_>>()
        .join(" ");

    if method.captures_stack() {
        let stack = raw_stack
            .map(|s| trim_stack(s, config.stack_frames_to_skip))
            .unwrap_or_default();
        if !stack.is_empty() {
            message.push('\n');
            message.push_str(&stack);
        }
    }

    Outbound::ConsoleOutput {
        level: method.level(),
        message,
        logged_at,
        raw,
    }
}
