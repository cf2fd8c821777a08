use std::path::PathBuf;

use qvm_bytecode::{ByteOrder, SymbolTable};
use qvm_vm::{LogTracer, Vm};

use super::run_common::{CommandError, RejectSyscalls, fail, init_tracing, load_image, load_symbols};
use crate::cli::LogChoice;

/// Function to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Instruction index.
    Index(i32),
    /// Name from the symbol map.
    Symbol(String),
}

pub struct ExecArgs {
    pub image_path: PathBuf,
    pub args: Vec<i32>,
    pub entry: Entry,
    pub byte_order: ByteOrder,
    pub map: Option<PathBuf>,
    pub fuel: u64,
    pub recursion_limit: u32,
    pub stack_size: usize,
    pub log: LogChoice,
}

pub fn run(args: ExecArgs) {
    init_tracing(args.log);

    let result = load_image(&args.image_path).and_then(|bytes| {
        let symbols = load_symbols(args.map.as_deref())?;
        execute(&bytes, &args, symbols)
    });

    match result {
        Ok(value) => println!("{}", value),
        Err(e) => fail(e),
    }
}

/// Load `bytes` and run the requested function once.
pub fn execute(bytes: &[u8], args: &ExecArgs, symbols: SymbolTable) -> Result<i32, CommandError> {
    let name = args
        .image_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "qvm".to_owned());

    let mut vm = Vm::builder(name, RejectSyscalls)
        .byte_order(args.byte_order)
        .stack_size(args.stack_size)
        .exec_fuel(args.fuel)
        .recursion_limit(args.recursion_limit)
        .symbols(symbols)
        .build(bytes)?;

    let value = match (&args.entry, args.log) {
        (Entry::Index(target), LogChoice::Trace) => {
            let mut tracer = LogTracer::with_symbols(vm.symbols().clone());
            vm.call_with(*target, &args.args, &mut tracer)?
        }
        (Entry::Symbol(name), LogChoice::Trace) => {
            let mut tracer = LogTracer::with_symbols(vm.symbols().clone());
            vm.call_symbol_with(name, &args.args, &mut tracer)?
        }
        (Entry::Index(target), _) => vm.call(*target, &args.args)?,
        (Entry::Symbol(name), _) => vm.call_symbol(name, &args.args)?,
    };

    tracing::debug!(entry = ?args.entry, value, "returned");
    Ok(value)
}
