//! Dispatch logic: extract params from ArgMatches and convert to command args.

use std::path::PathBuf;

use clap::ArgMatches;
use qvm_bytecode::ByteOrder;

use super::LogChoice;
use crate::commands::check::CheckArgs;
use crate::commands::exec::{Entry, ExecArgs};

pub struct CheckParams {
    pub image_path: PathBuf,
    pub big_endian: bool,
    pub map: Option<PathBuf>,
    pub stack_size: usize,
    pub json: bool,
    pub log: LogChoice,
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image_path: image_path(m),
            big_endian: m.get_flag("big_endian"),
            map: m.get_one::<PathBuf>("map").cloned(),
            stack_size: m.get_one::<usize>("stack_size").copied().unwrap_or(0x10000),
            json: m.get_flag("json"),
            log: parse_log(m),
        }
    }
}

impl From<CheckParams> for CheckArgs {
    fn from(p: CheckParams) -> Self {
        Self {
            image_path: p.image_path,
            byte_order: byte_order(p.big_endian),
            map: p.map,
            stack_size: p.stack_size,
            json: p.json,
            log: p.log,
        }
    }
}

pub struct ExecParams {
    pub image_path: PathBuf,
    pub args: Vec<i32>,
    pub entry: Option<i32>,
    pub symbol: Option<String>,
    pub big_endian: bool,
    pub map: Option<PathBuf>,
    pub fuel: u64,
    pub recursion_limit: u32,
    pub stack_size: usize,
    pub log: LogChoice,
}

impl ExecParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image_path: image_path(m),
            args: m
                .get_many::<i32>("args")
                .map(|values| values.copied().collect())
                .unwrap_or_default(),
            entry: m.get_one::<i32>("entry").copied(),
            symbol: m.get_one::<String>("symbol").cloned(),
            big_endian: m.get_flag("big_endian"),
            map: m.get_one::<PathBuf>("map").cloned(),

            // Limits
            fuel: m.get_one::<u64>("fuel").copied().unwrap_or(100_000_000),
            recursion_limit: m.get_one::<u32>("recursion_limit").copied().unwrap_or(1024),
            stack_size: m.get_one::<usize>("stack_size").copied().unwrap_or(0x10000),
            log: parse_log(m),
        }
    }
}

impl From<ExecParams> for ExecArgs {
    fn from(p: ExecParams) -> Self {
        let entry = match (p.symbol, p.entry) {
            (Some(name), _) => Entry::Symbol(name),
            (None, index) => Entry::Index(index.unwrap_or(0)),
        };

        Self {
            image_path: p.image_path,
            args: p.args,
            entry,
            byte_order: byte_order(p.big_endian),
            map: p.map,
            fuel: p.fuel,
            recursion_limit: p.recursion_limit,
            stack_size: p.stack_size,
            log: p.log,
        }
    }
}

/// clap enforces the positional as required.
fn image_path(m: &ArgMatches) -> PathBuf {
    m.get_one::<PathBuf>("image_path")
        .cloned()
        .unwrap_or_default()
}

fn byte_order(big_endian: bool) -> ByteOrder {
    if big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    }
}

/// Parse --debug/--trace into LogChoice.
fn parse_log(m: &ArgMatches) -> LogChoice {
    if m.get_flag("trace") {
        LogChoice::Trace
    } else if m.get_flag("debug") {
        LogChoice::Debug
    } else {
        LogChoice::Quiet
    }
}
