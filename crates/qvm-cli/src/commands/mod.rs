pub mod check;
pub mod exec;
pub mod run_common;
