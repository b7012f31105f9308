//! The flow matrix: per-step signal assignments handed over by the
//! scheduler.

mod bits;
mod matrix;

use std::collections::btree_map::{self, BTreeMap};

use crate::utils::arena::entity_impl;

pub use bits::{Bits, ControlWord};
pub use matrix::{FlowMatrix, Signal};

/// A control step, the index of one cycle of the microprogram.
pub type ControlStep = usize;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalIdx(u32);
entity_impl!(SignalIdx, "sig");

/// An assignment to one target during one control step.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Flow {
    /// A literal selected through the target's symbol.
    Constant(Bits),
    /// The target is driven by another signal.
    Forward(SignalIdx),
    /// A literal stored verbatim in the target's value-word lane.
    Raw(Bits),
    /// No assignment; the neutral flow applies.
    Absent,
}

static ABSENT: Flow = Flow::Absent;

/// The decoded content of a target in one control step.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Assignment {
    Value(Bits),
    Signal(SignalIdx),
}

/// The flows active in one control step, at most one per target.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct StepFlow {
    flows: BTreeMap<SignalIdx, Flow>,
}

impl StepFlow {
    pub fn new() -> StepFlow {
        StepFlow::default()
    }

    /// Sets the flow of `target`, returning the flow it replaces.
    pub fn insert(&mut self, target: SignalIdx, flow: Flow) -> Option<Flow> {
        self.flows.insert(target, flow)
    }

    /// The flow of `target`, `Absent` if there is none.
    pub fn lookup(&self, target: SignalIdx) -> &Flow {
        self.flows.get(&target).unwrap_or(&ABSENT)
    }

    /// Overlays `other` on `self`. `Absent` flows in `other` leave the
    /// existing flow untouched.
    pub fn integrate(&mut self, other: &StepFlow) {
        for (&target, flow) in other {
            if *flow != Flow::Absent {
                self.flows.insert(target, flow.clone());
            }
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = SignalIdx> + '_ {
        self.flows.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SignalIdx, Flow> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl<'a> IntoIterator for &'a StepFlow {
    type Item = (&'a SignalIdx, &'a Flow);
    type IntoIter = btree_map::Iter<'a, SignalIdx, Flow>;

    fn into_iter(self) -> Self::IntoIter {
        self.flows.iter()
    }
}

impl IntoIterator for StepFlow {
    type Item = (SignalIdx, Flow);
    type IntoIter = btree_map::IntoIter<SignalIdx, Flow>;

    fn into_iter(self) -> Self::IntoIter {
        self.flows.into_iter()
    }
}

impl FromIterator<(SignalIdx, Flow)> for StepFlow {
    fn from_iter<I: IntoIterator<Item = (SignalIdx, Flow)>>(iter: I) -> Self {
        StepFlow {
            flows: iter.into_iter().collect(),
        }
    }
}
