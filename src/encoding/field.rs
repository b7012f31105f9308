//! Selector fields of the control word.

use std::collections::BTreeMap;

use malachite::Natural;

use super::packer::{Lane, ValueWordPacker};
use super::symbols::{Content, Contents, Symbol, SymbolTable};
use crate::decoder::{AlgorithmBuilder, Expr, PortUsage, SignalBinder, Wire};
use crate::flow::{
    Assignment, Bits, ControlStep, ControlWord, FlowMatrix, SignalIdx,
};
use crate::utils::arena::EntityRef;

/// One group's selector, placed in the control word.
pub struct MicroField {
    table: SymbolTable,
    offset: u32,
    order: usize,
}

/// The registered one-hot symbol of a field in a staged decoder.
pub struct StagedSymbol {
    pub symbol: Wire,
    /// The symbol delayed by one more cycle, if the decoder has an extra
    /// register stage.
    pub delayed: Option<Wire>,
}

impl StagedSymbol {
    /// The wire the combinational stage decodes from.
    pub fn decoded(&self) -> Wire {
        self.delayed.unwrap_or(self.symbol)
    }
}

impl MicroField {
    pub fn new(table: SymbolTable, offset: u32, order: usize) -> MicroField {
        MicroField {
            table,
            offset,
            order,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn width(&self) -> u32 {
        self.table.width()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn count(&self) -> u32 {
        self.table.count() as u32
    }

    fn selector(&self, symbol: Symbol) -> Bits {
        Bits::new(Natural::from(symbol.as_u32()), self.width())
            .expect("symbol exceeds its selector")
    }

    /// Writes the symbol of this field's targets in `contents` into `word`.
    /// The symbol must be the one recorded for `step`.
    pub fn encode(
        &self,
        step: ControlStep,
        contents: &Contents,
        word: &mut ControlWord,
    ) {
        let own: Contents = self
            .table
            .targets()
            .iter()
            .map(|target| (*target, contents[target].clone()))
            .collect();

        let symbol = self.table.symbol_of(&own).unwrap_or_else(|| {
            panic!("c-step {step}: flow unknown to field {}", self.order)
        });

        assert_eq!(
            symbol,
            self.table.symbol(step),
            "c-step {step}: field {} encodes a different symbol",
            self.order,
        );

        if self.width() > 0 {
            word.write(self.offset, &self.selector(symbol));
        }
    }

    /// Reference decoding of this field's targets from `word`.
    pub fn decode(
        &self,
        word: &ControlWord,
        packer: &ValueWordPacker,
        matrix: &FlowMatrix,
    ) -> BTreeMap<SignalIdx, Assignment> {
        let raw = word.read(self.offset, self.width());
        let index = usize::try_from(&raw).unwrap_or(usize::MAX);

        assert!(
            index < self.table.count(),
            "field {}: symbol {raw} out of range",
            self.order,
        );

        self.table
            .contents(Symbol::new(index))
            .iter()
            .map(|(&target, content)| {
                let assignment = match content {
                    Content::Literal(bits) => Assignment::Value(bits.clone()),
                    Content::Forward(source) => Assignment::Signal(*source),
                    Content::Lane => {
                        let lane = lane_of(packer, target);
                        let value = word.read(lane.offset, lane.width);

                        Assignment::Value(
                            Bits::new(value, matrix[target].width)
                                .expect("lane wider than its target"),
                        )
                    }
                };

                (target, assignment)
            })
            .collect()
    }

    fn implement<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        contents: &Contents,
        value_word: Option<Wire>,
        packer: &ValueWordPacker,
    ) {
        for (&target, content) in contents {
            let src = match content {
                Content::Literal(bits) => Expr::Literal(bits.clone()),
                Content::Forward(source) => Expr::Read(Wire::Design(*source)),
                Content::Lane => {
                    let lane = lane_of(packer, target);
                    let Some(value_word) = value_word else {
                        panic!("lane read of {target} without a value word");
                    };

                    Expr::slice(value_word, lane.offset, lane.width)
                }
            };

            builder.store(Wire::Design(target), src);
        }
    }

    fn implement_unknown<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        matrix: &FlowMatrix,
    ) {
        for &target in self.table.targets() {
            let unknown = Expr::Unknown(matrix[target].width);
            builder.store(Wire::Design(target), unknown);
        }
    }

    /// Decodes the selector straight from the control word `cw`.
    pub fn assemble_decoder<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        cw: Wire,
        packer: &ValueWordPacker,
        matrix: &FlowMatrix,
    ) {
        if self.table.count() == 1 {
            let contents = self.table.contents(Symbol::neutral());
            self.implement(builder, contents, Some(cw), packer);

            return;
        }

        builder.begin_switch(Expr::slice(cw, self.offset, self.width()));

        for (symbol, contents) in self.table.iter() {
            builder.case(self.selector(symbol));
            self.implement(builder, contents, Some(cw), packer);
            builder.end_case();
        }

        builder.default_case();
        self.implement_unknown(builder, matrix);
        builder.end_case();
        builder.end_switch();
    }

    /// Registers the selector of `cw` as a one-hot symbol. Fields with a
    /// single symbol need no register.
    pub fn assemble_staged_sync<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        binder: &mut dyn SignalBinder,
        cw: Wire,
    ) -> Option<StagedSymbol> {
        let count = self.count();

        if count == 1 {
            return None;
        }

        let name = format!("MUXSymbol{}", self.order);
        let symbol = binder.signal(PortUsage::Default, &name, count);

        builder.begin_switch(Expr::slice(cw, self.offset, self.width()));

        for (sym, _) in self.table.iter() {
            builder.case(self.selector(sym));
            let one_hot = Bits::one_hot(sym.as_u32(), count);
            builder.store(symbol, Expr::Literal(one_hot));
            builder.end_case();
        }

        builder.default_case();
        builder.store(symbol, Expr::Unknown(count));
        builder.end_case();
        builder.end_switch();

        Some(StagedSymbol {
            symbol,
            delayed: None,
        })
    }

    /// Delays a registered symbol by one more cycle.
    pub fn assemble_staged_register<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        binder: &mut dyn SignalBinder,
        staged: &mut StagedSymbol,
    ) {
        let count = self.count();
        let name = format!("MUXReg{}", self.order);
        let delayed = binder.signal(PortUsage::Default, &name, count);

        builder.store(delayed, Expr::Read(staged.symbol));
        staged.delayed = Some(delayed);
    }

    /// Decodes the one-hot symbol of `staged`. The all-zero symbol held by
    /// the registers at power-up decodes like symbol 0.
    pub fn assemble_staged_comb<B: AlgorithmBuilder>(
        &self,
        builder: &mut B,
        staged: Option<&StagedSymbol>,
        value_word: Option<Wire>,
        packer: &ValueWordPacker,
        matrix: &FlowMatrix,
    ) {
        let neutral = self.table.contents(Symbol::neutral());

        let Some(staged) = staged else {
            self.implement(builder, neutral, value_word, packer);
            return;
        };

        let count = self.count();

        builder.begin_switch(Expr::Read(staged.decoded()));

        builder.case(Bits::zero(count));
        self.implement(builder, neutral, value_word, packer);
        builder.end_case();

        for (symbol, contents) in self.table.iter() {
            builder.case(Bits::one_hot(symbol.as_u32(), count));
            self.implement(builder, contents, value_word, packer);
            builder.end_case();
        }

        builder.default_case();
        self.implement_unknown(builder, matrix);
        builder.end_case();
        builder.end_switch();
    }
}

fn lane_of(packer: &ValueWordPacker, target: SignalIdx) -> Lane {
    packer
        .lane(target)
        .unwrap_or_else(|| panic!("{target} has no value-word lane"))
}
