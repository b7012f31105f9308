//! Merging of symbol spaces.
//!
//! Two groups can share one selector field if the pairs of symbols they
//! carry together are few enough. The joint table enumerates only the pairs
//! that actually occur, which is usually far fewer than the cross product.

use std::iter;

use smallvec::SmallVec;

use super::symbols::{Symbol, SymbolTable};
use crate::utils::{selector_width, Interned};

/// Joint symbols of two symbol sequences.
pub struct JointEncoding {
    /// The joint symbol of every step.
    pub symbols: Vec<Symbol>,
    /// The pair of original symbols every joint symbol stands for.
    pub pairs: Interned<Symbol, (Symbol, Symbol)>,
}

/// Enumerates the symbol pairs of `seq0` and `seq1` that co-occur in some
/// step. The pair of neutral symbols is always joint symbol 0; the other
/// pairs are numbered in order of first occurrence.
pub fn encode_together(seq0: &[Symbol], seq1: &[Symbol]) -> JointEncoding {
    assert_eq!(seq0.len(), seq1.len(), "symbol sequences differ in length");

    let mut pairs = Interned::new();
    let zero = pairs.intern((Symbol::neutral(), Symbol::neutral()));
    assert_eq!(zero, Symbol::neutral());

    let symbols = iter::zip(seq0, seq1)
        .map(|(&sym0, &sym1)| pairs.intern((sym0, sym1)))
        .collect();

    JointEncoding { symbols, pairs }
}

/// A prospective merge of the groups in slots `pair.0` and `pair.1`.
pub struct MergeCandidate {
    pub pair: (usize, usize),
    joint: JointEncoding,
    score: i64,
}

impl MergeCandidate {
    pub fn new(
        pair: (usize, usize),
        group0: &SymbolTable,
        group1: &SymbolTable,
    ) -> MergeCandidate {
        assert!(group0.count() > 1 && group1.count() > 1);

        let joint = encode_together(group0.symbols(), group1.symbols());
        let width = selector_width(joint.pairs.len());
        let unmerged = group0.width() + group1.width();

        assert!(width <= unmerged, "merged selector wider than its parts");

        MergeCandidate {
            pair,
            joint,
            score: i64::from(unmerged) - i64::from(width),
        }
    }

    /// Selector bits saved by the merge.
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn count(&self) -> usize {
        self.joint.pairs.len()
    }

    pub fn width(&self) -> u32 {
        selector_width(self.count())
    }

    /// Builds the merged table. Every merged symbol decodes to the union of
    /// the contents of its two original symbols.
    pub fn realize(
        self,
        group0: &SymbolTable,
        group1: &SymbolTable,
    ) -> SymbolTable {
        let targets: SmallVec<[_; 4]> = group0
            .targets()
            .iter()
            .chain(group1.targets())
            .copied()
            .collect();

        assert!(
            group0.targets().iter().all(|t| !group1.targets().contains(t)),
            "merging groups with common targets",
        );

        let mut table = Interned::new();

        for (sym, &(sym0, sym1)) in self.joint.pairs.iter() {
            let mut contents = group0.contents(sym0).clone();
            contents.extend(
                group1
                    .contents(sym1)
                    .iter()
                    .map(|(&target, content)| (target, content.clone())),
            );

            assert_eq!(table.intern(contents), sym, "merged symbols collide");
        }

        let merged =
            SymbolTable::from_parts(targets, self.joint.symbols, table);

        for (step, &sym) in merged.symbols().iter().enumerate() {
            let contents = merged.contents(sym);

            for group in [group0, group1] {
                let original = group.contents(group.symbol(step));

                for (target, content) in original {
                    assert_eq!(
                        contents.get(target),
                        Some(content),
                        "c-step {step}: merged symbol {sym} misdecodes {target}",
                    );
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::symbols::Content;
    use crate::flow::{Bits, Flow, SignalIdx};
    use crate::utils::arena::EntityRef;

    fn lit(value: u64) -> Bits {
        Bits::from_u64(value, 4).unwrap()
    }

    /// A table of one target whose neutral literal is `1`; each entry of
    /// `values` is the literal of one step.
    fn table(target: usize, values: &[u64]) -> SymbolTable {
        let flows: Vec<_> =
            values.iter().map(|&v| Flow::Constant(lit(v))).collect();

        SymbolTable::new(
            SignalIdx::new(target),
            Content::Literal(lit(1)),
            &flows,
        )
    }

    #[test]
    fn only_cooccurring_pairs_are_enumerated() {
        let a = table(0, &[1, 1, 2, 2]);
        let b = table(1, &[1, 2, 1, 1]);

        let joint = encode_together(a.symbols(), b.symbols());
        let sym = |i| Symbol::new(i);

        assert_eq!(joint.symbols, vec![sym(0), sym(1), sym(2), sym(2)]);
        assert_eq!(joint.pairs.len(), 3);
        assert_eq!(joint.pairs[sym(2)], (sym(1), sym(0)));
    }

    #[test]
    fn neutral_pair_is_symbol_zero_even_if_unobserved() {
        let a = table(0, &[2, 3]);
        let b = table(1, &[2, 2]);

        let joint = encode_together(a.symbols(), b.symbols());

        let zero = Symbol::neutral();

        assert_eq!(joint.pairs[zero], (zero, zero));
        assert_eq!(joint.pairs.len(), 3);
        assert!(joint.symbols.iter().all(|&s| s != zero));
    }

    #[test]
    fn three_joint_symbols_save_nothing() {
        let a = table(0, &[1, 1, 2, 2]);
        let b = table(1, &[1, 2, 1, 1]);

        let candidate = MergeCandidate::new((0, 1), &a, &b);

        assert_eq!(candidate.count(), 3);
        assert_eq!(candidate.width(), 2);
        assert_eq!(candidate.score(), 0);
    }

    #[test]
    fn full_cross_product_saves_nothing() {
        let a = table(0, &[1, 1, 2, 2]);
        let b = table(1, &[1, 2, 1, 2]);

        let candidate = MergeCandidate::new((0, 1), &a, &b);

        assert_eq!(candidate.count(), 4);
        assert_eq!(candidate.score(), 0);
    }

    #[test]
    fn correlated_groups_save_a_bit() {
        let a = table(0, &[1, 2, 2, 1]);
        let b = table(1, &[1, 2, 2, 1]);

        let candidate = MergeCandidate::new((0, 1), &a, &b);

        assert_eq!(candidate.count(), 2);
        assert_eq!(candidate.width(), 1);
        assert_eq!(candidate.score(), 1);
    }

    #[test]
    fn realized_merge_reproduces_both_groups() {
        let a = table(0, &[1, 2, 3, 2, 1]);
        let b = table(1, &[5, 6, 7, 6, 5]);

        let merged = MergeCandidate::new((0, 1), &a, &b).realize(&a, &b);

        assert_eq!(merged.targets(), &[SignalIdx::new(0), SignalIdx::new(1)]);
        assert_eq!(merged.count(), 4);

        for step in 0..5 {
            let contents = merged.contents(merged.symbol(step));

            for group in [&a, &b] {
                let target = group.targets()[0];
                assert_eq!(
                    contents[&target],
                    group.contents(group.symbol(step))[&target],
                );
            }
        }

        let neutral = merged.contents(Symbol::neutral());
        assert_eq!(neutral[&SignalIdx::new(0)], Content::Literal(lit(1)));
        assert_eq!(neutral[&SignalIdx::new(1)], Content::Literal(lit(1)));
    }
}
