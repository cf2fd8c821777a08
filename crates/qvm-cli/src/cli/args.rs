//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` that can be composed into commands.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Module image file (positional).
pub fn image_path_arg() -> Arg {
    Arg::new("image_path")
        .value_name("IMAGE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Compiled module image")
}

/// Image byte order (--big-endian).
pub fn big_endian_arg() -> Arg {
    Arg::new("big_endian")
        .long("big-endian")
        .action(ArgAction::SetTrue)
        .help("Image was written big-endian")
}

/// Symbol map file (--map).
pub fn map_arg() -> Arg {
    Arg::new("map")
        .long("map")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Symbol map (`segment address name` per line)")
}

/// JSON output (--json).
pub fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print the summary as JSON")
}

/// Entry instruction (--entry).
pub fn entry_arg() -> Arg {
    Arg::new("entry")
        .long("entry")
        .value_name("N")
        .value_parser(value_parser!(i32))
        .conflicts_with("symbol")
        .help("Instruction index of the function to run [default: 0]")
}

/// Entry function by name (--symbol).
pub fn symbol_arg() -> Arg {
    Arg::new("symbol")
        .long("symbol")
        .value_name("NAME")
        .requires("map")
        .help("Name of the function to run, resolved through --map")
}

/// Integer call arguments (positional, trailing).
pub fn call_args_arg() -> Arg {
    Arg::new("args")
        .value_name("ARGS")
        .num_args(0..)
        .allow_negative_numbers(true)
        .value_parser(value_parser!(i32))
        .help("Integer arguments passed to the function (at most 13)")
}

/// Execution fuel limit (--fuel).
pub fn fuel_arg() -> Arg {
    Arg::new("fuel")
        .long("fuel")
        .value_name("N")
        .default_value("100000000")
        .value_parser(value_parser!(u64))
        .help("Instructions a call may execute")
}

/// Frame depth limit (--recursion-limit).
pub fn recursion_limit_arg() -> Arg {
    Arg::new("recursion_limit")
        .long("recursion-limit")
        .value_name("N")
        .default_value("1024")
        .value_parser(value_parser!(u32))
        .help("Maximum nested bytecode frames")
}

/// Program stack size (--stack-size).
pub fn stack_size_arg() -> Arg {
    Arg::new("stack_size")
        .long("stack-size")
        .value_name("BYTES")
        .default_value("65536")
        .value_parser(value_parser!(usize))
        .help("Program stack size in bytes")
}

/// Lifecycle logging (--debug).
pub fn debug_arg() -> Arg {
    Arg::new("debug")
        .long("debug")
        .action(ArgAction::SetTrue)
        .conflicts_with("trace")
        .help("Log load and fault details")
}

/// Instruction tracing (--trace).
pub fn trace_arg() -> Arg {
    Arg::new("trace")
        .long("trace")
        .action(ArgAction::SetTrue)
        .help("Log every executed instruction")
}
