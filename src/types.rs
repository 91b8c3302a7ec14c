// src/types.rs

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub use nix::sys::signal::Signal;

/// Signal used when termination is non-negotiable.
pub const FORCE_SIGNAL: Signal = Signal::SIGKILL;

/// Signal sent to a process when we want it to shut down, unless configured otherwise.
pub const DEFAULT_SHUTDOWN_SIGNAL: Signal = Signal::SIGINT;

/// How long a process may take to exit after the shutdown signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(4000);

/// Parse a POSIX signal name.
///
/// Accepts `SIGINT`, `sigint`, `INT` and `int`.
pub fn parse_signal(s: &str) -> Result<Signal, String> {
    let upper = s.trim().to_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };

    Signal::from_str(&name).map_err(|_| format!("invalid signal name: {s}"))
}

pub(crate) fn deserialize_signal<'de, D>(deserializer: D) -> Result<Option<Signal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_signal(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// What to connect one standard stream of the child to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    Inherit,
    Pipe,
    Ignore,
}

impl StdioMode {
    pub fn to_stdio(self) -> Stdio {
        match self {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Pipe => Stdio::piped(),
            StdioMode::Ignore => Stdio::null(),
        }
    }
}

impl FromStr for StdioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inherit" => Ok(StdioMode::Inherit),
            "pipe" => Ok(StdioMode::Pipe),
            "ignore" => Ok(StdioMode::Ignore),
            other => Err(format!(
                "invalid stdio mode: {other} (expected \"inherit\", \"pipe\" or \"ignore\")"
            )),
        }
    }
}

impl fmt::Display for StdioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StdioMode::Inherit => "inherit",
            StdioMode::Pipe => "pipe",
            StdioMode::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

/// Stdio configuration for spawned processes.
///
/// Deserializes from either a single mode applied to all three streams or a
/// `[stdin, stdout, stderr]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStdio")]
pub struct StdioConfig {
    pub stdin: StdioMode,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
}

impl StdioConfig {
    pub fn uniform(mode: StdioMode) -> Self {
        Self {
            stdin: mode,
            stdout: mode,
            stderr: mode,
        }
    }

    /// Debugger tracking only works when we can read the child's stderr.
    pub fn captures_stderr(&self) -> bool {
        self.stderr == StdioMode::Pipe
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            stdin: StdioMode::Inherit,
            stdout: StdioMode::Inherit,
            stderr: StdioMode::Pipe,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStdio {
    Uniform(StdioMode),
    PerStream([StdioMode; 3]),
}

impl From<RawStdio> for StdioConfig {
    fn from(raw: RawStdio) -> Self {
        match raw {
            RawStdio::Uniform(mode) => StdioConfig::uniform(mode),
            RawStdio::PerStream([stdin, stdout, stderr]) => StdioConfig {
                stdin,
                stdout,
                stderr,
            },
        }
    }
}

/// A shutdown grace period as the user wrote it: plain milliseconds or a
/// human-readable duration such as `"4 seconds"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GracePeriod {
    Millis(u64),
    Text(String),
}

impl From<u64> for GracePeriod {
    fn from(ms: u64) -> Self {
        GracePeriod::Millis(ms)
    }
}

impl From<&str> for GracePeriod {
    fn from(s: &str) -> Self {
        GracePeriod::Text(s.to_string())
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GracePeriod::Millis(ms) => write!(f, "{ms}"),
            GracePeriod::Text(s) => f.write_str(s),
        }
    }
}
