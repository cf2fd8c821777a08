use std::fmt;
use std::path::PathBuf;

use qvm_bytecode::{ByteOrder, Image, SymbolTable};
use qvm_vm::Vm;
use serde::Serialize;

use super::run_common::{CommandError, RejectSyscalls, fail, init_tracing, load_image, load_symbols};
use crate::cli::LogChoice;

pub struct CheckArgs {
    pub image_path: PathBuf,
    pub byte_order: ByteOrder,
    pub map: Option<PathBuf>,
    pub stack_size: usize,
    pub json: bool,
    pub log: LogChoice,
}

/// Layout of a verified image once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub instructions: usize,
    pub code_offset: i32,
    pub code_length: i32,
    pub data_offset: i32,
    pub data_length: i32,
    pub lit_length: i32,
    pub bss_length: i32,
    /// Allocated data segment, a power of two.
    pub memory_size: usize,
    pub stack_start: u32,
    pub stack_end: u32,
    pub symbols: usize,
}

pub fn run(args: CheckArgs) {
    init_tracing(args.log);

    let result = load_image(&args.image_path).and_then(|bytes| {
        let symbols = load_symbols(args.map.as_deref())?;
        let summary = summarize(&bytes, args.byte_order, args.stack_size, symbols)?;
        if args.json {
            Ok(format!("{}\n", serde_json::to_string_pretty(&summary)?))
        } else {
            Ok(summary.to_string())
        }
    });

    match result {
        Ok(output) => print!("{}", output),
        Err(e) => fail(e),
    }
}

/// Load and verify `bytes`, then describe the image and the resulting layout.
pub fn summarize(
    bytes: &[u8],
    byte_order: ByteOrder,
    stack_size: usize,
    symbols: SymbolTable,
) -> Result<Summary, CommandError> {
    let vm = Vm::builder("check", RejectSyscalls)
        .byte_order(byte_order)
        .stack_size(stack_size)
        .symbols(symbols)
        .build(bytes)?;
    let image = Image::parse(bytes, byte_order).map_err(qvm_vm::Error::from)?;
    let header = image.header();
    let stack = vm.stack_range();

    Ok(Summary {
        instructions: vm.code().len(),
        code_offset: header.code_offset,
        code_length: header.code_length,
        data_offset: header.data_offset,
        data_length: header.data_length,
        lit_length: header.lit_length,
        bss_length: header.bss_length,
        memory_size: vm.memory().len(),
        stack_start: stack.start,
        stack_end: stack.end,
        symbols: vm.symbols().len(),
    })
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instructions: {}", self.instructions)?;
        writeln!(
            f,
            "code:         {} bytes at {:#x}",
            self.code_length, self.code_offset
        )?;
        writeln!(
            f,
            "data:         {} bytes at {:#x} ({} literal)",
            self.data_length, self.data_offset, self.lit_length
        )?;
        writeln!(f, "bss:          {} bytes", self.bss_length)?;
        writeln!(
            f,
            "memory:       {:#x} bytes (mask {:#x})",
            self.memory_size,
            self.memory_size - 1
        )?;
        writeln!(f, "stack:        {:#x}..{:#x}", self.stack_start, self.stack_end)?;
        if self.symbols > 0 {
            writeln!(f, "symbols:      {}", self.symbols)?;
        }
        Ok(())
    }
}
