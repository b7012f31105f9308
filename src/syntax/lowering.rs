use std::collections::HashMap;

use super::ast;
use crate::flow::{Bits, Flow, FlowMatrix, SignalIdx, StepFlow};
use crate::utils::{Diagnostic, Reporter, Span};

/// Builds the flow matrix of a parsed flow file, reporting the first
/// semantic error.
pub fn lower_ast(
    file: &ast::FlowFile,
    reporter: &mut Reporter,
) -> Option<FlowMatrix> {
    let mut builder = Builder {
        reporter,
        matrix: FlowMatrix::new(),
        names: HashMap::with_capacity(file.signals.len()),
    };

    builder.lower_file(file).ok()?;

    if let Err(diagnostic) = builder.matrix.validate() {
        builder.reporter.emit(&diagnostic);

        return None;
    }

    Some(builder.matrix)
}

#[derive(Debug)]
struct LoweringError;

struct Builder<'a, 'ast, 'src> {
    reporter: &'a mut Reporter<'src>,
    matrix: FlowMatrix,
    names: HashMap<&'ast str, (SignalIdx, Span)>,
}

impl<'ast> Builder<'_, 'ast, '_> {
    fn lower_file(
        &mut self,
        file: &'ast ast::FlowFile,
    ) -> Result<(), LoweringError> {
        for decl in &file.signals {
            self.lower_signal(decl)?;
        }

        if let Some(neutral) = &file.neutral {
            for (target, flow) in self.lower_block(neutral)? {
                self.matrix.set_neutral(target, flow);
            }
        }

        for step in &file.steps {
            let flow = self.lower_block(step)?;
            self.matrix.push_step(flow);
        }

        Ok(())
    }

    fn lower_signal(
        &mut self,
        decl: &'ast ast::SignalDecl,
    ) -> Result<(), LoweringError> {
        if let Some(&(_, first)) = self.names.get(decl.name.name.as_str()) {
            self.reporter.emit(
                &Diagnostic::error()
                    .with_message(format!(
                        "signal `{}` declared twice",
                        decl.name.name,
                    ))
                    .with_primary(decl.name.span, "duplicate declaration")
                    .with_secondary(first, "first declared here"),
            );

            return Err(LoweringError);
        }

        let width = match u32::try_from(&decl.width.value) {
            Ok(0) => {
                self.reporter.emit(
                    &Diagnostic::error()
                        .with_message("zero-width signal")
                        .with_primary(decl.width.span, "width must be positive"),
                );

                return Err(LoweringError);
            }
            Ok(width) => width,
            Err(_) => {
                self.reporter.emit(
                    &Diagnostic::error()
                        .with_message("unsupported signal width")
                        .with_primary(decl.width.span, "width too large"),
                );

                return Err(LoweringError);
            }
        };

        let init = match &decl.init {
            Some(init) => self.lower_literal(init, &decl.name.name, width)?,
            None => Bits::zero(width),
        };

        let idx = self.matrix.add_signal(&decl.name.name, width, init);
        self.names.insert(&decl.name.name, (idx, decl.name.span));

        Ok(())
    }

    fn lower_block(
        &mut self,
        block: &ast::Block,
    ) -> Result<StepFlow, LoweringError> {
        let mut flow = StepFlow::new();
        let mut assigned: HashMap<SignalIdx, Span> = HashMap::new();

        for assignment in &block.assignments {
            let target = self.lookup(&assignment.target)?;

            if let Some(&first) = assigned.get(&target) {
                self.reporter.emit(
                    &Diagnostic::error()
                        .with_message(format!(
                            "`{}` assigned twice in one block",
                            assignment.target.name,
                        ))
                        .with_primary(assignment.span, "second assignment")
                        .with_secondary(first, "first assignment")
                        .with_secondary(block.span, "in this block"),
                );

                return Err(LoweringError);
            }

            assigned.insert(target, assignment.span);

            let lowered = self.lower_source(target, assignment)?;
            flow.insert(target, lowered);
        }

        Ok(flow)
    }

    fn lower_source(
        &mut self,
        target: SignalIdx,
        assignment: &ast::AssignmentDef,
    ) -> Result<Flow, LoweringError> {
        let name = &assignment.target.name;
        let width = self.matrix[target].width;

        Ok(match &assignment.source {
            ast::Source::Constant(value) => {
                Flow::Constant(self.lower_literal(value, name, width)?)
            }
            ast::Source::Raw(value) => {
                Flow::Raw(self.lower_literal(value, name, width)?)
            }
            ast::Source::Forward(ident) => {
                let source = self.lookup(ident)?;

                if source == target {
                    self.reporter.emit(
                        &Diagnostic::error()
                            .with_message(format!("`{name}` forwards itself"))
                            .with_primary(assignment.span, "self-forwarding"),
                    );

                    return Err(LoweringError);
                }

                let source_width = self.matrix[source].width;

                if source_width != width {
                    self.reporter.emit(
                        &Diagnostic::error()
                            .with_message("forward width mismatch")
                            .with_primary(
                                ident.span,
                                format!("{source_width}-bit source"),
                            )
                            .with_secondary(
                                assignment.target.span,
                                format!("{width}-bit target"),
                            ),
                    );

                    return Err(LoweringError);
                }

                Flow::Forward(source)
            }
            ast::Source::Absent => Flow::Absent,
        })
    }

    fn lower_literal(
        &mut self,
        literal: &ast::Number,
        name: &str,
        width: u32,
    ) -> Result<Bits, LoweringError> {
        Bits::new(literal.value.clone(), width).ok_or_else(|| {
            self.reporter.emit(
                &Diagnostic::error()
                    .with_message("literal overflows its signal")
                    .with_primary(literal.span, "literal too wide")
                    .with_note(format!("`{name}` is {width} bits wide")),
            );

            LoweringError
        })
    }

    fn lookup(
        &mut self,
        ident: &ast::Ident,
    ) -> Result<SignalIdx, LoweringError> {
        match self.names.get(ident.name.as_str()) {
            Some(&(idx, _)) => Ok(idx),
            None => {
                self.reporter.emit(
                    &Diagnostic::error()
                        .with_message(format!(
                            "unknown signal `{}`",
                            ident.name,
                        ))
                        .with_primary(ident.span, "not declared"),
                );

                Err(LoweringError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::FlowParser;

    fn lower(src: &str) -> (Option<FlowMatrix>, usize) {
        let file = FlowParser::parse_file(src).unwrap();
        let mut reporter = Reporter::new("test.flow", src);
        let matrix = lower_ast(&file, &mut reporter);

        (matrix, reporter.error_count())
    }

    #[test]
    fn lowers_signals_and_steps() {
        let (matrix, errors) = lower(
            "signals { a: 8 = 1; b: 8; s: 8; }
             neutral { b = 0; }
             step { a = raw 200; b <- s; }
             step { a = _; }",
        );

        let matrix = matrix.unwrap();
        let a = SignalIdx::from_u32(0);
        let b = SignalIdx::from_u32(1);
        let s = SignalIdx::from_u32(2);

        assert_eq!(errors, 0);
        assert_eq!(matrix.num_steps(), 2);
        assert_eq!(matrix[a].init, Bits::from_u64(1, 8).unwrap());
        assert_eq!(
            matrix.neutral().lookup(b),
            &Flow::Constant(Bits::zero(8)),
        );
        assert_eq!(
            matrix.flow(0).lookup(a),
            &Flow::Raw(Bits::from_u64(200, 8).unwrap()),
        );
        assert_eq!(matrix.flow(0).lookup(b), &Flow::Forward(s));
        assert_eq!(matrix.targets(), vec![a, b]);
    }

    #[test]
    fn duplicate_signal() {
        let (matrix, errors) = lower("signals { a: 1; a: 2; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn zero_width_signal() {
        let (matrix, errors) = lower("signals { a: 0; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn unknown_signal() {
        let (matrix, errors) = lower("signals { a: 1; } step { b = 1; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn duplicate_assignment() {
        let (matrix, errors) =
            lower("signals { a: 4; } step { a = 1; a = raw 2; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn literal_overflow() {
        let (matrix, errors) = lower("signals { a: 4; } step { a = 0x10; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn forward_width_mismatch() {
        let (matrix, errors) =
            lower("signals { a: 4; s: 8; } step { a <- s; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }

    #[test]
    fn self_forwarding() {
        let (matrix, errors) = lower("signals { a: 4; } step { a <- a; }");

        assert!(matrix.is_none());
        assert_eq!(errors, 1);
    }
}
