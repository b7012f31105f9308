//! Abstract syntax for flow files.

use malachite::Natural;

use crate::utils::Span;

#[derive(Clone, Debug)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Number {
    pub value: Natural,
    pub span: Span,
}

/// `name: width [= init];`
#[derive(Debug)]
pub struct SignalDecl {
    pub name: Ident,
    pub width: Number,
    pub init: Option<Number>,
}

#[derive(Debug)]
pub enum Source {
    /// `name = number;`
    Constant(Number),
    /// `name = raw number;`
    Raw(Number),
    /// `name <- source;`
    Forward(Ident),
    /// `name = _;`
    Absent,
}

#[derive(Debug)]
pub struct AssignmentDef {
    pub target: Ident,
    pub source: Source,
    pub span: Span,
}

#[derive(Debug)]
pub struct Block {
    pub assignments: Vec<AssignmentDef>,
    pub span: Span,
}

/// A parsed flow file: signal declarations, an optional neutral flow and
/// one block per control step.
#[derive(Debug)]
pub struct FlowFile {
    pub signals: Vec<SignalDecl>,
    pub neutral: Option<Block>,
    pub steps: Vec<Block>,
}
