mod builder;
mod compile;
mod decoder;
mod rom;

use builder::IRBuilder;

pub use compile::{compile_microcode, ControlpathConfig, Program};
pub use decoder::compile_decoder;
pub use rom::MicrocodeRom;
