//! SystemVerilog rendering of decoder processes.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use calyx_utils::{Id, NameGenerator};

use super::binder::{LocalIdx, PortUsage, Process, ProcessKind, SignalBinder};
use super::builder::{Expr, Stmt, Wire};
use crate::flow::{FlowMatrix, SignalIdx};
use crate::utils::arena::PrimaryMap;

pub struct Local {
    pub name: String,
    pub usage: PortUsage,
    pub width: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Input,
    Output,
}

/// A port of the rendered module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Port {
    pub name: String,
    pub width: u32,
    pub direction: Direction,
    pub usage: PortUsage,
}

/// A binder collecting decoder processes into the body of one SystemVerilog
/// module. Design signals keep their names from the flow matrix; locals are
/// named apart from them.
pub struct VerilogModule<'a> {
    matrix: &'a FlowMatrix,
    names: NameGenerator,
    locals: PrimaryMap<LocalIdx, Local>,
    processes: Vec<Process>,
}

impl<'a> VerilogModule<'a> {
    pub fn new(matrix: &'a FlowMatrix) -> VerilogModule<'a> {
        let taken: HashSet<Id> =
            matrix.signals().map(|(_, sig)| Id::new(&sig.name)).collect();

        VerilogModule {
            matrix,
            names: NameGenerator::with_prev_defined_names(taken),
            locals: PrimaryMap::new(),
            processes: Vec::new(),
        }
    }

    pub fn local(&self, idx: LocalIdx) -> &Local {
        &self.locals[idx]
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn name(&self, wire: Wire) -> &str {
        match wire {
            Wire::Design(sig) => &self.matrix[sig].name,
            Wire::Local(local) => &self.locals[local].name,
        }
    }

    fn width(&self, wire: Wire) -> u32 {
        match wire {
            Wire::Design(sig) => self.matrix[sig].width,
            Wire::Local(local) => self.locals[local].width,
        }
    }

    fn driven(&self) -> BTreeSet<Wire> {
        fn collect(stmts: &[Stmt], driven: &mut BTreeSet<Wire>) {
            for stmt in stmts {
                match stmt {
                    Stmt::Store { dst, .. } => {
                        driven.insert(*dst);
                    }
                    Stmt::Switch { cases, default, .. } => {
                        for case in cases {
                            collect(&case.body, driven);
                        }
                        collect(default.as_deref().unwrap_or(&[]), driven);
                    }
                }
            }
        }

        let mut driven = BTreeSet::new();

        for process in &self.processes {
            collect(&process.function.body, &mut driven);
        }

        driven
    }

    /// Input ports: allocated clock and input signals, then design signals
    /// read but not driven by the decoder. Output ports: driven design
    /// signals.
    pub fn ports(&self) -> Vec<Port> {
        let driven = self.driven();
        let read: BTreeSet<Wire> = self
            .processes
            .iter()
            .flat_map(|process| {
                process.function.reads.iter().chain(&process.sensitivity)
            })
            .copied()
            .collect();

        let locals = self
            .locals
            .iter()
            .filter(|(_, local)| local.usage != PortUsage::Default)
            .map(|(_, local)| Port {
                name: local.name.clone(),
                width: local.width,
                direction: Direction::Input,
                usage: local.usage,
            });

        let design = |wires: &BTreeSet<Wire>, direction| {
            wires
                .iter()
                .filter_map(|wire| match wire {
                    Wire::Design(sig) => Some(*sig),
                    Wire::Local(_) => None,
                })
                .map(move |sig: SignalIdx| Port {
                    name: self.matrix[sig].name.clone(),
                    width: self.matrix[sig].width,
                    direction,
                    usage: PortUsage::Default,
                })
                .collect::<Vec<_>>()
        };

        let sources: BTreeSet<_> = read.difference(&driven).copied().collect();

        locals
            .chain(design(&sources, Direction::Input))
            .chain(design(&driven, Direction::Output))
            .collect()
    }

    fn write_stmt(
        &self,
        f: &mut fmt::Formatter,
        stmt: &Stmt,
        level: usize,
        op: &str,
    ) -> fmt::Result {
        let indent = "  ".repeat(level);

        match stmt {
            Stmt::Store { dst, src } => {
                writeln!(
                    f,
                    "{indent}{} {op} {};",
                    self.name(*dst),
                    self.expr(src),
                )
            }
            Stmt::Switch {
                selector,
                cases,
                default,
            } => {
                writeln!(f, "{indent}case ({})", self.expr(selector))?;

                let labelled = cases
                    .iter()
                    .map(|case| (case.value.to_string(), &case.body))
                    .chain(
                        default
                            .iter()
                            .map(|body| (String::from("default"), body)),
                    );

                for (label, body) in labelled {
                    writeln!(f, "{indent}  {label}: begin")?;
                    for stmt in body {
                        self.write_stmt(f, stmt, level + 2, op)?;
                    }
                    writeln!(f, "{indent}  end")?;
                }

                writeln!(f, "{indent}endcase")
            }
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(bits) => bits.to_string(),
            Expr::Unknown(width) => format!("{width}'bx"),
            Expr::Read(wire) => self.name(*wire).to_string(),
            Expr::Slice { wire, lsb, width: 1 } => {
                format!("{}[{lsb}]", self.name(*wire))
            }
            Expr::Slice { wire, lsb, width } => {
                assert!(
                    lsb + width <= self.width(*wire),
                    "slice exceeds `{}`",
                    self.name(*wire),
                );

                format!("{}[{}:{lsb}]", self.name(*wire), lsb + width - 1)
            }
        }
    }

    fn write_process(
        &self,
        f: &mut fmt::Formatter,
        process: &Process,
    ) -> fmt::Result {
        let name = &process.function.name;

        let op = match process.kind {
            ProcessKind::Comb => {
                writeln!(f, "always_comb begin : {name}")?;
                "="
            }
            ProcessKind::Clocked { clock } => {
                writeln!(
                    f,
                    "always_ff @(posedge {}) begin : {name}",
                    self.name(clock),
                )?;
                "<="
            }
        };

        for stmt in &process.function.body {
            self.write_stmt(f, stmt, 1, op)?;
        }

        writeln!(f, "end")
    }
}

impl SignalBinder for VerilogModule<'_> {
    fn signal(&mut self, usage: PortUsage, name: &str, width: u32) -> Wire {
        assert!(width > 0, "zero-width signal `{name}`");

        let name = self.names.gen_name(name).to_string();

        Wire::Local(self.locals.push(Local { name, usage, width }))
    }

    fn create_process(&mut self, process: Process) {
        self.processes.push(process);
    }
}

impl fmt::Display for VerilogModule<'_> {
    /// Renders the declarations of internal signals and every process.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (_, local) in self.locals.iter() {
            if local.usage == PortUsage::Default {
                writeln!(f, "logic [{}:0] {};", local.width - 1, local.name)?;
            }
        }

        for process in &self.processes {
            self.write_process(f, process)?;
        }

        Ok(())
    }
}
