//! Allocation of decoder signals and registration of processes.

use std::collections::BTreeSet;

use super::builder::{Function, Wire};
use crate::utils::arena::entity_impl;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalIdx(u32);
entity_impl!(LocalIdx, "local");

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortUsage {
    Clock,
    Input,
    Default,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessKind {
    /// Re-evaluated whenever a signal in the sensitivity list changes.
    Comb,
    /// Evaluated on the rising edge of `clock`.
    Clocked { clock: Wire },
}

#[derive(Clone, Debug)]
pub struct Process {
    pub kind: ProcessKind,
    pub function: Function,
    pub sensitivity: BTreeSet<Wire>,
}

impl Process {
    /// A combinational process sensitive to everything it reads and to
    /// `extra`.
    pub fn comb<I>(function: Function, extra: I) -> Process
    where
        I: IntoIterator<Item = Wire>,
    {
        let sensitivity = function.reads.iter().copied().chain(extra).collect();

        Process {
            kind: ProcessKind::Comb,
            function,
            sensitivity,
        }
    }

    pub fn clocked(clock: Wire, function: Function) -> Process {
        Process {
            kind: ProcessKind::Clocked { clock },
            function,
            sensitivity: BTreeSet::from([clock]),
        }
    }
}

/// The design the decoder is instantiated in.
pub trait SignalBinder {
    /// Allocates a fresh `width`-bit signal named after `name`.
    fn signal(&mut self, usage: PortUsage, name: &str, width: u32) -> Wire;

    fn create_process(&mut self, process: Process);
}
