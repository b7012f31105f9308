//! Control-word decoder synthesis.

pub mod binder;
pub mod builder;
pub mod mode;
pub mod verilog;

pub use binder::{LocalIdx, PortUsage, Process, ProcessKind, SignalBinder};
pub use builder::{
    AlgorithmBuilder, Case, DefaultAlgorithmBuilder, Expr, Function, Stmt, Wire,
};
pub use mode::DecoderMode;
pub use verilog::{Direction, Port, VerilogModule};
