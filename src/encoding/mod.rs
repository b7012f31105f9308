//! Horizontal microcode encoding.
//!
//! The control word of every step is a value word, holding literals that
//! are stored verbatim, followed by selector fields. Each field selects
//! the contents of a group of targets from a symbol table; groups are
//! formed by merging the tables of targets whose contents are correlated.

pub mod designer;
pub mod field;
pub mod merge;
pub mod packer;
pub mod report;
pub mod symbols;

pub use designer::MicrocodeDesign;
pub use field::{MicroField, StagedSymbol};
pub use packer::{Lane, ValueWordPacker};
pub use report::EncodingReport;
pub use symbols::{Content, Contents, Symbol, SymbolTable};
