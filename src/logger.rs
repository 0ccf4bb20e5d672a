//! # Log sink seam.
//!
//! The bus never prints directly: everything it wants to say goes through a
//! [`Logger`]. The default, [`TracingLogger`], forwards to the `tracing`
//! macros so the host's subscriber configuration applies. Hosts with their
//! own sink implement the trait and hand it to the builder.

use std::error::Error;

/// Severity of a bus log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Diagnostic chatter (unmatched events, idle transitions).
    Fine,
    /// Suspicious but recoverable conditions.
    Warning,
    /// Handler failures and internal errors.
    Severe,
}

/// Level-tagged log sink consumed by the bus.
pub trait Logger: Send + Sync + 'static {
    /// Writes a single message at the given level.
    fn log(&self, level: LogLevel, message: &str);

    /// Writes a message together with an error.
    fn log_error(&self, level: LogLevel, message: &str, error: &(dyn Error + 'static)) {
        self.log(level, &format!("{message}: {error}"));
    }
}

/// Default sink forwarding to the `tracing` macros.
///
/// `Fine` maps to `debug!`, `Warning` to `warn!`, `Severe` to `error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Fine => tracing::debug!(target: "postbus", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "postbus", "{message}"),
            LogLevel::Severe => tracing::error!(target: "postbus", "{message}"),
        }
    }
}
