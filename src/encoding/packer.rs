//! Bin-packing of lane-resident literals into the value word.
//!
//! Every target that ever carries a [`Flow::Raw`] literal needs a lane in
//! the value word. Two targets may share a lane unless some step requires
//! them to hold differing literals at the same time. Lanes are assigned
//! greedily: targets are visited widest first and join the first lane group
//! none of whose members they conflict with.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::flow::{Bits, Flow, SignalIdx, StepFlow};

/// The bit range of a target within the value word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Lane {
    pub offset: u32,
    pub width: u32,
}

struct LaneGroup {
    offset: u32,
    members: Vec<SignalIdx>,
}

#[derive(Default)]
pub struct ValueWordPacker {
    steps: Vec<Vec<(SignalIdx, Bits)>>,
    widths: BTreeMap<SignalIdx, u32>,
    lanes: BTreeMap<SignalIdx, Lane>,
    width: u32,
    packed: bool,
}

impl ValueWordPacker {
    pub fn new() -> ValueWordPacker {
        ValueWordPacker::default()
    }

    /// Records the lane-resident literals of one (merged) step.
    pub fn add_flow(&mut self, flow: &StepFlow) {
        assert!(!self.packed, "flow added after packing the value word");

        let literals: Vec<_> = flow
            .iter()
            .filter_map(|(&target, flow)| match flow {
                Flow::Raw(bits) => Some((target, bits.clone())),
                _ => None,
            })
            .collect();

        for (target, bits) in &literals {
            self.widths.insert(*target, bits.width());
        }

        self.steps.push(literals);
    }

    fn conflicts(&self) -> HashSet<(SignalIdx, SignalIdx)> {
        let mut conflicts = HashSet::new();

        for literals in &self.steps {
            for ((t0, v0), (t1, v1)) in literals.iter().tuple_combinations() {
                if v0 != v1 {
                    conflicts.insert((*t0, *t1));
                    conflicts.insert((*t1, *t0));
                }
            }
        }

        conflicts
    }

    /// Assigns lanes. Must be called exactly once, after every flow has been
    /// added.
    pub fn pack(&mut self) {
        assert!(!self.packed, "value word packed twice");
        self.packed = true;

        let conflicts = self.conflicts();
        let order = self
            .widths
            .iter()
            .sorted_by(|(t0, w0), (t1, w1)| w1.cmp(w0).then(t0.cmp(t1)));

        let mut groups: Vec<LaneGroup> = Vec::new();
        let mut offset = 0;

        for (&target, &width) in order {
            let compatible = groups.iter().position(|group| {
                group
                    .members
                    .iter()
                    .all(|&member| !conflicts.contains(&(member, target)))
            });

            let index = compatible.unwrap_or_else(|| {
                groups.push(LaneGroup {
                    offset,
                    members: Vec::new(),
                });
                offset += width;
                groups.len() - 1
            });

            let group = &mut groups[index];
            group.members.push(target);
            self.lanes.insert(
                target,
                Lane {
                    offset: group.offset,
                    width,
                },
            );
        }

        log::debug!(
            "packed {} lanes into {} groups, {offset} value bits",
            self.lanes.len(),
            groups.len(),
        );

        self.width = offset;
    }

    pub fn lane(&self, target: SignalIdx) -> Option<Lane> {
        assert!(self.packed, "value word not packed yet");

        self.lanes.get(&target).copied()
    }

    pub fn lanes(&self) -> impl Iterator<Item = (SignalIdx, Lane)> + '_ {
        self.lanes.iter().map(|(&target, &lane)| (target, lane))
    }

    pub fn value_word_width(&self) -> u32 {
        assert!(self.packed, "value word not packed yet");

        self.width
    }

    /// Width of the value word if every target had a lane of its own.
    pub fn uncompressed_width(&self) -> u32 {
        self.widths.values().sum()
    }
}
