//! Shared logic for check and exec commands.

use std::fs;
use std::path::{Path, PathBuf};

use qvm_bytecode::{SymbolError, SymbolTable};
use qvm_vm::{SyscallContext, SyscallError, SystemCalls};

use crate::cli::LogChoice;

/// Failures surfaced by a command before or while running the VM.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}': {source}", path.display())]
    Symbols {
        path: PathBuf,
        #[source]
        source: SymbolError,
    },

    #[error(transparent)]
    Vm(#[from] qvm_vm::Error),

    #[error("failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Host for command-line runs: every syscall fails.
#[derive(Debug, Default)]
pub struct RejectSyscalls;

impl SystemCalls for RejectSyscalls {
    fn syscall(
        &mut self,
        _ctx: &mut SyscallContext<'_>,
        _id: u32,
        _args: &[i32],
    ) -> Result<i32, SyscallError> {
        Err(SyscallError::Unknown)
    }
}

pub fn load_image(path: &Path) -> Result<Vec<u8>, CommandError> {
    fs::read(path).map_err(|source| CommandError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Load the symbol map at `path`, or an empty table when none was given.
pub fn load_symbols(path: Option<&Path>) -> Result<SymbolTable, CommandError> {
    let Some(path) = path else {
        return Ok(SymbolTable::new());
    };

    let text = fs::read_to_string(path).map_err(|source| CommandError::Io {
        path: path.to_owned(),
        source,
    })?;
    let symbols = SymbolTable::parse_map(&text).map_err(|source| CommandError::Symbols {
        path: path.to_owned(),
        source,
    })?;

    Ok(symbols)
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init_tracing(log: LogChoice) {
    let _ = tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(log.level())
        .try_init();
}

/// Print the error and exit with status 1.
pub fn fail(err: CommandError) -> ! {
    eprintln!("error: {}", err);
    std::process::exit(1)
}
