//! Command builders for the CLI.

use clap::Command;

use super::args::*;

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("qvm")
        .about("Load, verify and run sandboxed bytecode modules")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(check_command())
        .subcommand(exec_command())
}

/// Load and verify an image without running it.
pub fn check_command() -> Command {
    Command::new("check")
        .about("Verify an image and show its layout")
        .after_help(
            r#"EXAMPLES:
  qvm check game.qvm                  # header, segments, verification
  qvm check game.qvm --map game.map   # also load symbols
  qvm check game.qvm --big-endian     # image written on a big-endian host
  qvm check game.qvm --json           # machine-readable summary"#,
        )
        .arg(image_path_arg())
        .arg(big_endian_arg())
        .arg(map_arg())
        .arg(stack_size_arg())
        .arg(json_arg())
        .arg(debug_arg())
        .arg(trace_arg().hide(true))
}

/// Run one function and print its result.
pub fn exec_command() -> Command {
    Command::new("exec")
        .about("Run a function of an image and print its result")
        .override_usage(
            "\
  qvm exec <IMAGE> [ARGS]...
  qvm exec <IMAGE> --entry <N> [ARGS]...
  qvm exec <IMAGE> --map <FILE> --symbol <NAME> [ARGS]...",
        )
        .after_help(
            r#"EXAMPLES:
  qvm exec game.qvm 2 3                          # run instruction 0 with (2, 3)
  qvm exec game.qvm --entry 42 -- -1             # negative arguments after --
  qvm exec game.qvm --map game.map --symbol vmMain 0
  qvm exec game.qvm --fuel 1000 --trace          # log every instruction

Syscalls are not available: any syscall fails the call."#,
        )
        .arg(image_path_arg())
        .arg(call_args_arg())
        .arg(entry_arg())
        .arg(symbol_arg())
        .arg(big_endian_arg())
        .arg(map_arg())
        .arg(fuel_arg())
        .arg(recursion_limit_arg())
        .arg(stack_size_arg())
        .arg(debug_arg())
        .arg(trace_arg())
}
