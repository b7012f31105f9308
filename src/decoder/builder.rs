//! Construction of decoder process bodies.

use std::collections::BTreeSet;

use super::binder::LocalIdx;
use crate::flow::{Bits, SignalIdx};

/// A signal a process reads or drives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Wire {
    /// A signal declared in the flow matrix.
    Design(SignalIdx),
    /// A signal allocated by the binder.
    Local(LocalIdx),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expr {
    Literal(Bits),
    /// All bits undefined.
    Unknown(u32),
    Read(Wire),
    Slice { wire: Wire, lsb: u32, width: u32 },
}

impl Expr {
    pub fn slice(wire: Wire, lsb: u32, width: u32) -> Expr {
        Expr::Slice { wire, lsb, width }
    }

    fn wire(&self) -> Option<Wire> {
        match self {
            Expr::Read(wire) | Expr::Slice { wire, .. } => Some(*wire),
            Expr::Literal(_) | Expr::Unknown(_) => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Case {
    pub value: Bits,
    pub body: Vec<Stmt>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Stmt {
    Store {
        dst: Wire,
        src: Expr,
    },
    Switch {
        selector: Expr,
        cases: Vec<Case>,
        default: Option<Vec<Stmt>>,
    },
}

/// A completed process body.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub body: Vec<Stmt>,
    /// Every wire read by the body.
    pub reads: BTreeSet<Wire>,
}

/// Structured construction of `switch`/`case` process bodies.
pub trait AlgorithmBuilder {
    fn store(&mut self, dst: Wire, src: Expr);

    fn begin_switch(&mut self, selector: Expr);

    fn case(&mut self, value: Bits);

    fn default_case(&mut self);

    fn end_case(&mut self);

    fn end_switch(&mut self);
}

enum Frame {
    Block(Vec<Stmt>),
    Switch {
        selector: Expr,
        cases: Vec<Case>,
        default: Option<Vec<Stmt>>,
    },
    Case {
        value: Option<Bits>,
        body: Vec<Stmt>,
    },
}

/// Records the statements passed to it as a tree.
pub struct DefaultAlgorithmBuilder {
    stack: Vec<Frame>,
    reads: BTreeSet<Wire>,
}

impl DefaultAlgorithmBuilder {
    pub fn new() -> DefaultAlgorithmBuilder {
        DefaultAlgorithmBuilder {
            stack: vec![Frame::Block(Vec::new())],
            reads: BTreeSet::new(),
        }
    }

    fn push_stmt(&mut self, stmt: Stmt) {
        match self.stack.last_mut() {
            Some(Frame::Block(body) | Frame::Case { body, .. }) => {
                body.push(stmt)
            }
            _ => panic!("statement outside of a case"),
        }
    }

    fn read(&mut self, expr: &Expr) {
        self.reads.extend(expr.wire());
    }

    pub fn complete<S: Into<String>>(mut self, name: S) -> Function {
        assert_eq!(self.stack.len(), 1, "unterminated switch");

        let Some(Frame::Block(body)) = self.stack.pop() else {
            unreachable!()
        };

        Function {
            name: name.into(),
            body,
            reads: self.reads,
        }
    }
}

impl Default for DefaultAlgorithmBuilder {
    fn default() -> Self {
        DefaultAlgorithmBuilder::new()
    }
}

impl AlgorithmBuilder for DefaultAlgorithmBuilder {
    fn store(&mut self, dst: Wire, src: Expr) {
        self.read(&src);
        self.push_stmt(Stmt::Store { dst, src });
    }

    fn begin_switch(&mut self, selector: Expr) {
        self.read(&selector);
        self.stack.push(Frame::Switch {
            selector,
            cases: Vec::new(),
            default: None,
        });
    }

    fn case(&mut self, value: Bits) {
        assert!(
            matches!(self.stack.last(), Some(Frame::Switch { .. })),
            "case outside of a switch",
        );

        self.stack.push(Frame::Case {
            value: Some(value),
            body: Vec::new(),
        });
    }

    fn default_case(&mut self) {
        assert!(
            matches!(
                self.stack.last(),
                Some(Frame::Switch { default: None, .. })
            ),
            "default case outside of a switch or given twice",
        );

        self.stack.push(Frame::Case {
            value: None,
            body: Vec::new(),
        });
    }

    fn end_case(&mut self) {
        let Some(Frame::Case { value, body }) = self.stack.pop() else {
            panic!("end of case without a case");
        };

        match (self.stack.last_mut(), value) {
            (Some(Frame::Switch { cases, .. }), Some(value)) => {
                cases.push(Case { value, body })
            }
            (Some(Frame::Switch { default, .. }), None) => {
                *default = Some(body)
            }
            _ => unreachable!(),
        }
    }

    fn end_switch(&mut self) {
        let Some(Frame::Switch {
            selector,
            cases,
            default,
        }) = self.stack.pop()
        else {
            panic!("end of switch without a switch");
        };

        self.push_stmt(Stmt::Switch {
            selector,
            cases,
            default,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::arena::EntityRef;

    fn wire(i: usize) -> Wire {
        Wire::Design(SignalIdx::new(i))
    }

    #[test]
    fn nested_switches() {
        let mut builder = DefaultAlgorithmBuilder::new();

        builder.begin_switch(Expr::slice(wire(0), 0, 1));
        builder.case(Bits::from_u64(0, 1).unwrap());
        builder.store(wire(1), Expr::Read(wire(2)));
        builder.begin_switch(Expr::Read(wire(3)));
        builder.default_case();
        builder.store(wire(1), Expr::Unknown(4));
        builder.end_case();
        builder.end_switch();
        builder.end_case();
        builder.end_switch();
        builder.store(wire(4), Expr::Unknown(1));

        let function = builder.complete("f");

        assert_eq!(function.body.len(), 2);
        assert_eq!(
            function.reads,
            BTreeSet::from([wire(0), wire(2), wire(3)]),
        );

        let Stmt::Switch { cases, default, .. } = &function.body[0] else {
            panic!("expected a switch");
        };
        assert_eq!(cases.len(), 1);
        assert!(default.is_none());
        assert!(matches!(cases[0].body[1], Stmt::Switch { .. }));
    }

    #[test]
    #[should_panic(expected = "statement outside of a case")]
    fn store_directly_in_switch() {
        let mut builder = DefaultAlgorithmBuilder::new();

        builder.begin_switch(Expr::Read(wire(0)));
        builder.store(wire(1), Expr::Unknown(1));
    }

    #[test]
    #[should_panic(expected = "unterminated switch")]
    fn unterminated_switch() {
        let mut builder = DefaultAlgorithmBuilder::new();

        builder.begin_switch(Expr::Read(wire(0)));
        builder.complete("f");
    }
}
