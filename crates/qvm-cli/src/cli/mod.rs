mod args;
mod commands;
mod dispatch;


pub use commands::build_cli;
pub use dispatch::{CheckParams, ExecParams};

/// Log verbosity for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogChoice {
    /// Warnings only (VM faults).
    #[default]
    Quiet,
    /// Lifecycle events: image loaded, symbols loaded.
    Debug,
    /// Every executed instruction, call and syscall.
    Trace,
}

impl LogChoice {
    pub fn level(self) -> tracing::Level {
        match self {
            LogChoice::Quiet => tracing::Level::WARN,
            LogChoice::Debug => tracing::Level::DEBUG,
            LogChoice::Trace => tracing::Level::TRACE,
        }
    }
}
