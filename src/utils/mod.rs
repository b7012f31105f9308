pub mod diagnostics;
pub mod integer;
pub mod interned;

pub mod arena {
    pub use cranelift_entity::*;
}

pub use diagnostics::{Diagnostic, Reporter, Span};
pub use integer::{ceil_log2, selector_width};
pub use interned::Interned;
