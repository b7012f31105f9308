//! Flow-file front end.

pub mod ast;
mod lowering;
mod parser;

pub use lowering::lower_ast;
pub use parser::FlowParser;
