//! Parser for flow files.

use malachite::num::conversion::traits::FromStringBase;
use malachite::Natural;
use pest::error::{Error, ErrorVariant};
use pest_consume::{match_nodes, Parser};

use super::ast;
use crate::utils::Span;

#[derive(Parser)]
#[grammar = "syntax/flow.pest"]
pub struct FlowParser;

impl FlowParser {
    pub fn parse_file(src: &str) -> Result<ast::FlowFile, Box<Error<Rule>>> {
        let nodes = FlowParser::parse(Rule::file, src)?;

        FlowParser::file(nodes.single()?).map_err(Box::new)
    }
}

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

#[pest_consume::parser]
impl FlowParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn file(input: Node) -> ParseResult<ast::FlowFile> {
        Ok(match_nodes!(input.into_children();
            [signals(signals), neutral(neutral), step(steps).., EOI(_)] => {
                ast::FlowFile {
                    signals,
                    neutral: Some(neutral),
                    steps: steps.collect(),
                }
            },
            [signals(signals), step(steps).., EOI(_)] => ast::FlowFile {
                signals,
                neutral: None,
                steps: steps.collect(),
            },
        ))
    }

    fn signals(input: Node) -> ParseResult<Vec<ast::SignalDecl>> {
        Ok(match_nodes!(input.into_children();
            [signal_decl(decls)..] => decls.collect(),
        ))
    }

    fn signal_decl(input: Node) -> ParseResult<ast::SignalDecl> {
        Ok(match_nodes!(input.into_children();
            [ident(name), number(width)] => ast::SignalDecl {
                name,
                width,
                init: None,
            },
            [ident(name), number(width), init(init)] => ast::SignalDecl {
                name,
                width,
                init: Some(init),
            },
        ))
    }

    fn init(input: Node) -> ParseResult<ast::Number> {
        Ok(match_nodes!(input.into_children();
            [number(value)] => value,
        ))
    }

    fn block(input: Node) -> ParseResult<ast::Block> {
        let span = Span::from(input.as_span());

        Ok(match_nodes!(input.into_children();
            [assignment(assignments)..] => ast::Block {
                assignments: assignments.collect(),
                span,
            },
        ))
    }

    fn neutral(input: Node) -> ParseResult<ast::Block> {
        Ok(match_nodes!(input.into_children();
            [block(block)] => block,
        ))
    }

    fn step(input: Node) -> ParseResult<ast::Block> {
        Ok(match_nodes!(input.into_children();
            [block(block)] => block,
        ))
    }

    fn assignment(input: Node) -> ParseResult<ast::AssignmentDef> {
        let span = Span::from(input.as_span());

        Ok(match_nodes!(input.into_children();
            [ident(target), forward(source)] => {
                ast::AssignmentDef { target, source, span }
            },
            [ident(target), raw(source)] => {
                ast::AssignmentDef { target, source, span }
            },
            [ident(target), absent(source)] => {
                ast::AssignmentDef { target, source, span }
            },
            [ident(target), constant(source)] => {
                ast::AssignmentDef { target, source, span }
            },
        ))
    }

    fn forward(input: Node) -> ParseResult<ast::Source> {
        Ok(match_nodes!(input.into_children();
            [ident(source)] => ast::Source::Forward(source),
        ))
    }

    fn raw_kwd(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn raw(input: Node) -> ParseResult<ast::Source> {
        Ok(match_nodes!(input.into_children();
            [raw_kwd(_), number(value)] => ast::Source::Raw(value),
        ))
    }

    fn absent_kwd(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn absent(input: Node) -> ParseResult<ast::Source> {
        Ok(match_nodes!(input.into_children();
            [absent_kwd(_)] => ast::Source::Absent,
        ))
    }

    fn constant(input: Node) -> ParseResult<ast::Source> {
        Ok(match_nodes!(input.into_children();
            [number(value)] => ast::Source::Constant(value),
        ))
    }

    fn ident(input: Node) -> ParseResult<ast::Ident> {
        Ok(ast::Ident {
            name: input.as_str().to_string(),
            span: Span::from(input.as_span()),
        })
    }

    fn hex(input: Node) -> ParseResult<Natural> {
        parse_natural(&input, 2, 16)
    }

    fn bin(input: Node) -> ParseResult<Natural> {
        parse_natural(&input, 2, 2)
    }

    fn dec(input: Node) -> ParseResult<Natural> {
        parse_natural(&input, 0, 10)
    }

    fn number(input: Node) -> ParseResult<ast::Number> {
        let span = Span::from(input.as_span());

        let value = match_nodes!(input.into_children();
            [hex(value)] => value,
            [bin(value)] => value,
            [dec(value)] => value,
        );

        Ok(ast::Number { value, span })
    }
}

/// Parses the digits of `input` following a `prefix`-byte radix prefix.
#[allow(clippy::result_large_err)]
fn parse_natural(
    input: &Node,
    prefix: usize,
    base: u8,
) -> ParseResult<Natural> {
    let digits = &input.as_str()[prefix..];

    Natural::from_string_base(base, digits).ok_or_else(|| {
        Error::new_from_span(
            ErrorVariant::CustomError {
                message: format!("invalid base-{base} literal"),
            },
            input.as_span(),
        )
    })
}
