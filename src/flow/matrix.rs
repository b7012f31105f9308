use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use super::{Assignment, Bits, ControlStep, Flow, SignalIdx, StepFlow};
use crate::utils::arena::PrimaryMap;
use crate::utils::Diagnostic;

/// A storage location or source signal of the synthesized design.
pub struct Signal {
    pub name: String,
    pub width: u32,
    /// Value assumed when neither the step nor the neutral flow assigns the
    /// signal.
    pub init: Bits,
}

/// Per-step flows plus the neutral flow every step is merged with.
#[derive(Default)]
pub struct FlowMatrix {
    signals: PrimaryMap<SignalIdx, Signal>,
    neutral: StepFlow,
    steps: Vec<StepFlow>,
}

impl FlowMatrix {
    pub fn new() -> FlowMatrix {
        FlowMatrix::default()
    }

    pub fn add_signal<S: Into<String>>(
        &mut self,
        name: S,
        width: u32,
        init: Bits,
    ) -> SignalIdx {
        assert_eq!(init.width(), width, "initial value width mismatch");

        self.signals.push(Signal {
            name: name.into(),
            width,
            init,
        })
    }

    pub fn signals(&self) -> impl Iterator<Item = (SignalIdx, &Signal)> {
        self.signals.iter()
    }

    pub fn set_neutral(&mut self, target: SignalIdx, flow: Flow) {
        self.neutral.insert(target, flow);
    }

    pub fn push_step(&mut self, flow: StepFlow) -> ControlStep {
        self.steps.push(flow);
        self.steps.len() - 1
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn neutral(&self) -> &StepFlow {
        &self.neutral
    }

    pub fn flow(&self, step: ControlStep) -> &StepFlow {
        &self.steps[step]
    }

    /// The neutral flow overlaid with the flow of `step`.
    pub fn merged_flow(&self, step: ControlStep) -> StepFlow {
        let mut flow = self.neutral.clone();
        flow.integrate(&self.steps[step]);
        flow
    }

    /// Every signal assigned by the neutral flow or by any step, in
    /// declaration order.
    pub fn targets(&self) -> Vec<SignalIdx> {
        let targets: BTreeSet<_> = self
            .steps
            .iter()
            .chain([&self.neutral])
            .flat_map(StepFlow::targets)
            .collect();

        targets.into_iter().collect()
    }

    /// The canonical decoded content of `flow` for `target`.
    pub fn resolve(&self, target: SignalIdx, flow: &Flow) -> Assignment {
        match flow {
            Flow::Constant(bits) | Flow::Raw(bits) => {
                Assignment::Value(bits.clone())
            }
            Flow::Forward(source) => Assignment::Signal(*source),
            Flow::Absent => Assignment::Value(self[target].init.clone()),
        }
    }

    /// The assignments every target must receive in `step`.
    pub fn resolve_step(
        &self,
        step: ControlStep,
    ) -> BTreeMap<SignalIdx, Assignment> {
        let flow = self.merged_flow(step);

        self.targets()
            .into_iter()
            .map(|target| (target, self.resolve(target, flow.lookup(target))))
            .collect()
    }

    /// Checks that literals and forwarded sources match their target widths.
    pub fn validate(&self) -> Result<(), Diagnostic> {
        let blocks = [("neutral flow".to_string(), &self.neutral)]
            .into_iter()
            .chain(
                self.steps
                    .iter()
                    .enumerate()
                    .map(|(step, flow)| (format!("c-step {step}"), flow)),
            );

        for (block, flow) in blocks {
            for (&target, flow) in flow {
                self.validate_flow(target, flow).map_err(|message| {
                    Diagnostic::error()
                        .with_message(format!("invalid flow in {block}"))
                        .with_note(message)
                })?;
            }
        }

        Ok(())
    }

    fn validate_flow(
        &self,
        target: SignalIdx,
        flow: &Flow,
    ) -> Result<(), String> {
        let signal = self
            .signals
            .get(target)
            .ok_or_else(|| format!("undeclared target {target}"))?;

        match flow {
            Flow::Constant(bits) | Flow::Raw(bits)
                if bits.width() != signal.width =>
            {
                Err(format!(
                    "{}-bit literal assigned to {}-bit signal `{}`",
                    bits.width(),
                    signal.width,
                    signal.name,
                ))
            }
            Flow::Forward(source) if *source == target => {
                Err(format!("signal `{}` forwarded to itself", signal.name))
            }
            Flow::Forward(source) => {
                let src = self
                    .signals
                    .get(*source)
                    .ok_or_else(|| format!("undeclared source {source}"))?;

                if src.width == signal.width {
                    Ok(())
                } else {
                    Err(format!(
                        "{}-bit signal `{}` forwarded to {}-bit signal `{}`",
                        src.width, src.name, signal.width, signal.name,
                    ))
                }
            }
            _ => Ok(()),
        }
    }
}

impl Index<SignalIdx> for FlowMatrix {
    type Output = Signal;

    fn index(&self, index: SignalIdx) -> &Signal {
        &self.signals[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: u64, width: u32) -> Bits {
        Bits::from_u64(value, width).unwrap()
    }

    #[test]
    fn targets_and_resolution() {
        let mut matrix = FlowMatrix::new();

        let a = matrix.add_signal("a", 4, lit(0, 4));
        let b = matrix.add_signal("b", 4, lit(9, 4));
        let unused = matrix.add_signal("unused", 1, lit(0, 1));

        matrix.set_neutral(a, Flow::Constant(lit(1, 4)));
        matrix.push_step(StepFlow::new());
        matrix.push_step([(b, Flow::Forward(a))].into_iter().collect());

        assert_eq!(matrix.targets(), vec![a, b]);
        assert!(!matrix.targets().contains(&unused));

        let step0 = matrix.resolve_step(0);
        assert_eq!(step0[&a], Assignment::Value(lit(1, 4)));
        assert_eq!(step0[&b], Assignment::Value(lit(9, 4)));

        let step1 = matrix.resolve_step(1);
        assert_eq!(step1[&b], Assignment::Signal(a));
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));

        matrix.push_step([(a, Flow::Raw(lit(1, 2)))].into_iter().collect());
        assert!(matrix.validate().is_err());
    }

    #[test]
    fn forward_width_mismatch_is_rejected() {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));
        let b = matrix.add_signal("b", 2, lit(0, 2));

        matrix.set_neutral(b, Flow::Forward(a));

        let err = matrix.validate().unwrap_err();
        assert_eq!(err.message(), "invalid flow in neutral flow");
    }
}
