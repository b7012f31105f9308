//! Symbol tables.
//!
//! A symbol table assigns small integers to the distinct contents a group of
//! targets carries across all control steps. Symbol 0 is always the content
//! of the neutral flow, so an all-zero selector decodes to the neutral flow.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::flow::{Bits, ControlStep, Flow, SignalIdx};
use crate::utils::arena::{entity_impl, EntityRef};
use crate::utils::{selector_width, Interned};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);
entity_impl!(Symbol, "sym");

impl Symbol {
    /// The symbol reserved for the neutral flow.
    pub fn neutral() -> Symbol {
        Symbol::new(0)
    }
}

/// What a decoder stores into one target for one symbol.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Content {
    Literal(Bits),
    Forward(SignalIdx),
    /// Read of the target's lane in the value word.
    Lane,
}

impl Content {
    /// Canonicalizes `flow`. `Absent` takes the content `default`.
    pub fn of(flow: &Flow, default: &Content) -> Content {
        match flow {
            Flow::Constant(bits) => Content::Literal(bits.clone()),
            Flow::Forward(source) => Content::Forward(*source),
            Flow::Raw(_) => Content::Lane,
            Flow::Absent => default.clone(),
        }
    }
}

/// The contents of every target of a group for one symbol.
pub type Contents = BTreeMap<SignalIdx, Content>;

pub struct SymbolTable {
    targets: SmallVec<[SignalIdx; 4]>,
    symbols: Vec<Symbol>,
    table: Interned<Symbol, Contents>,
}

impl SymbolTable {
    /// Builds the table of a single target from its flows in step order.
    pub fn new(target: SignalIdx, neutral: Content, flows: &[Flow]) -> Self {
        let mut table = Interned::new();

        let zero = table.intern(Contents::from([(target, neutral.clone())]));
        assert_eq!(zero, Symbol::neutral());

        let symbols = flows
            .iter()
            .map(|flow| {
                let content = Content::of(flow, &neutral);
                table.intern(Contents::from([(target, content)]))
            })
            .collect();

        SymbolTable {
            targets: SmallVec::from_slice(&[target]),
            symbols,
            table,
        }
    }

    pub(super) fn from_parts(
        targets: SmallVec<[SignalIdx; 4]>,
        symbols: Vec<Symbol>,
        table: Interned<Symbol, Contents>,
    ) -> Self {
        assert!(!table.is_empty(), "symbol table without neutral symbol");

        SymbolTable {
            targets,
            symbols,
            table,
        }
    }

    pub fn targets(&self) -> &[SignalIdx] {
        &self.targets
    }

    /// The symbol of every control step.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, step: ControlStep) -> Symbol {
        self.symbols[step]
    }

    pub fn count(&self) -> usize {
        self.table.len()
    }

    pub fn width(&self) -> u32 {
        selector_width(self.count())
    }

    pub fn contents(&self, symbol: Symbol) -> &Contents {
        &self.table[symbol]
    }

    pub fn symbol_of(&self, contents: &Contents) -> Option<Symbol> {
        self.table.get(contents)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Contents)> {
        self.table.iter()
    }
}
