pub mod backend;
pub mod decoder;
pub mod encoding;
pub mod flow;
pub mod opts;
pub mod syntax;
pub mod utils;
