use std::fmt;

const COMPLETE_WIRE: &str = "[HELIOS_TASK_COMPLETE]";
const FAILED_PREFIX: &str = "[HELIOS_TASK_FAILED:";
const FAILED_SUFFIX: &str = "]";

/// The exactly-one final message published on a task's log channel.
///
/// Bit-exact wire format: `[HELIOS_TASK_COMPLETE]` or
/// `[HELIOS_TASK_FAILED:<detail>]`. `<detail>` is informational, never
/// a stable API for callers to match on beyond "did it start with
/// `[HELIOS_TASK_FAILED`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMarker {
    Complete,
    Failed(String),
}

impl TerminalMarker {
    pub fn failed(detail: impl Into<String>) -> Self {
        TerminalMarker::Failed(detail.into())
    }

    /// Detail token for an exit code, e.g. `2`.
    pub fn exit_code(code: i64) -> Self {
        TerminalMarker::Failed(code.to_string())
    }

    pub fn is_failed_wire_prefix(s: &str) -> bool {
        s.starts_with("[HELIOS_TASK_FAILED")
    }
}

impl fmt::Display for TerminalMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalMarker::Complete => f.write_str(COMPLETE_WIRE),
            TerminalMarker::Failed(detail) => {
                write!(f, "{FAILED_PREFIX}{detail}{FAILED_SUFFIX}")
            }
        }
    }
}
