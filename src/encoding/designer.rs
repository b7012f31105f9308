//! Computation of the horizontal microcode encoding of a flow matrix.

use std::collections::{BTreeMap, BTreeSet};
use std::iter;
use std::time::Instant;

use itertools::Itertools;

use super::field::MicroField;
use super::merge::MergeCandidate;
use super::packer::{Lane, ValueWordPacker};
use super::report::EncodingReport;
use super::symbols::{Content, Contents, SymbolTable};
use crate::decoder::{
    AlgorithmBuilder, DecoderMode, DefaultAlgorithmBuilder, Expr, PortUsage,
    Process, SignalBinder, Wire,
};
use crate::flow::{
    Assignment, ControlStep, ControlWord, Flow, FlowMatrix, SignalIdx,
    StepFlow,
};

/// The layout of the control word: the value word at bit 0, followed by
/// one selector field per group of targets.
pub struct MicrocodeDesign<'a> {
    matrix: &'a FlowMatrix,
    packer: ValueWordPacker,
    neutral: Contents,
    fields: Vec<MicroField>,
    width: u32,
    decoder_built: bool,
}

impl<'a> MicrocodeDesign<'a> {
    /// Computes an encoding whose merged selectors are at most
    /// `max_sel_width` bits wide.
    pub fn compute(
        matrix: &'a FlowMatrix,
        max_sel_width: u32,
    ) -> (MicrocodeDesign<'a>, EncodingReport) {
        let start = Instant::now();
        let targets = matrix.targets();

        let neutral: Contents = targets
            .iter()
            .map(|&target| {
                let init = Content::Literal(matrix[target].init.clone());
                let flow = matrix.neutral().lookup(target);

                (target, Content::of(flow, &init))
            })
            .collect();

        let mut packer = ValueWordPacker::new();
        let mut flows: Vec<Vec<Flow>> = vec![Vec::new(); targets.len()];

        packer.add_flow(matrix.neutral());

        for step in 0..matrix.num_steps() {
            let flow = matrix.merged_flow(step);
            packer.add_flow(&flow);

            for (target, flows) in iter::zip(&targets, &mut flows) {
                flows.push(flow.lookup(*target).clone());
            }
        }

        packer.pack();

        let mut groups: Vec<Option<SymbolTable>> = iter::zip(&targets, &flows)
            .map(|(&target, flows)| {
                let table =
                    SymbolTable::new(target, neutral[&target].clone(), flows);

                if table.width() > max_sel_width {
                    log::warn!(
                        "selector of `{}` needs {} bits, more than {}",
                        matrix[target].name,
                        table.width(),
                        max_sel_width,
                    );
                }

                Some(table)
            })
            .collect();

        let initial_selector_bits =
            groups.iter().flatten().map(SymbolTable::width).sum();
        let generations = merge_groups(&mut groups, max_sel_width);

        let mut offset = packer.value_word_width();
        let mut histogram = BTreeMap::new();

        let fields: Vec<_> = groups
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(order, table)| {
                let field = MicroField::new(table, offset, order);
                offset += field.width();
                *histogram.entry(field.width()).or_insert(0) += 1;
                field
            })
            .collect();

        let report = EncodingReport {
            steps: matrix.num_steps(),
            max_sel_width,
            initial_selector_bits,
            initial_value_bits: packer.uncompressed_width(),
            generations,
            selector_bits: offset - packer.value_word_width(),
            value_bits: packer.value_word_width(),
            histogram,
        };

        log::info!(
            "control word: {} bits ({} value bits, {} fields)",
            offset,
            packer.value_word_width(),
            fields.len(),
        );
        log::debug!("encoding computed in {:?}", start.elapsed());

        let design = MicrocodeDesign {
            matrix,
            packer,
            neutral,
            fields,
            width: offset,
            decoder_built: false,
        };

        (design, report)
    }

    pub fn control_word_width(&self) -> u32 {
        self.width
    }

    pub fn value_word_width(&self) -> u32 {
        self.packer.value_word_width()
    }

    pub fn fields(&self) -> &[MicroField] {
        &self.fields
    }

    pub fn lanes(&self) -> impl Iterator<Item = (SignalIdx, Lane)> + '_ {
        self.packer.lanes()
    }

    /// The control word of `step` executing `flow`. The merged flow must
    /// decode to the symbols recorded for `step`.
    pub fn encode(&self, step: ControlStep, flow: &StepFlow) -> ControlWord {
        let mut merged = self.matrix.neutral().clone();
        merged.integrate(flow);

        let mut word = ControlWord::zeros(self.width);

        for (&target, flow) in &merged {
            if let Flow::Raw(bits) = flow {
                let lane = self.packer.lane(target).unwrap_or_else(|| {
                    panic!("c-step {step}: {target} has no value-word lane")
                });

                word.write(lane.offset, bits);
            }
        }

        let contents: Contents = self
            .neutral
            .iter()
            .map(|(&target, neutral)| {
                (target, Content::of(merged.lookup(target), neutral))
            })
            .collect();

        for field in &self.fields {
            field.encode(step, &contents, &mut word);
        }

        word
    }

    /// Reference decoding of a control word.
    pub fn decode(
        &self,
        word: &ControlWord,
    ) -> BTreeMap<SignalIdx, Assignment> {
        self.fields
            .iter()
            .flat_map(|field| field.decode(word, &self.packer, self.matrix))
            .collect()
    }

    /// Checks that the control word of `step` decodes to the assignments
    /// the step requires.
    pub fn verify_step(&self, step: ControlStep) {
        let word = self.encode(step, self.matrix.flow(step));

        assert_eq!(
            self.decode(&word),
            self.matrix.resolve_step(step),
            "c-step {step}: control word {word} misdecodes",
        );
    }

    /// Registers the decoder processes with `binder`. `cw` carries the
    /// current control word.
    pub fn build_decoder(
        &mut self,
        mode: DecoderMode,
        binder: &mut dyn SignalBinder,
        cw: Wire,
    ) {
        assert!(!self.decoder_built, "decoder built twice");
        self.decoder_built = true;

        match mode {
            DecoderMode::Combinational => self.build_comb_decoder(binder, cw),
            DecoderMode::Staged => self.build_staged_decoder(binder, cw, false),
            DecoderMode::StagedRegistered => {
                self.build_staged_decoder(binder, cw, true)
            }
        }
    }

    fn build_comb_decoder(&self, binder: &mut dyn SignalBinder, cw: Wire) {
        let mut builder = DefaultAlgorithmBuilder::new();

        for field in &self.fields {
            field.assemble_decoder(&mut builder, cw, &self.packer, self.matrix);
        }

        let function = builder.complete("cwdecode");
        binder.create_process(Process::comb(function, [cw]));
    }

    fn build_staged_decoder(
        &self,
        binder: &mut dyn SignalBinder,
        cw: Wire,
        registered: bool,
    ) {
        let clock = binder.signal(PortUsage::Clock, "clk", 1);
        let value_bits = self.value_word_width();

        let mut sync = DefaultAlgorithmBuilder::new();

        let mut value_word = (value_bits > 0).then(|| {
            let d1 = binder.signal(PortUsage::Default, "D1_CW", value_bits);
            sync.store(d1, Expr::slice(cw, 0, value_bits));
            d1
        });

        let mut staged: Vec<_> = self
            .fields
            .iter()
            .map(|field| field.assemble_staged_sync(&mut sync, binder, cw))
            .collect();

        if registered {
            value_word = value_word.map(|d1| {
                let d2 = binder.signal(PortUsage::Default, "D2_CW", value_bits);
                sync.store(d2, Expr::Read(d1));
                d2
            });

            for (field, staged) in iter::zip(&self.fields, &mut staged) {
                if let Some(staged) = staged {
                    field.assemble_staged_register(&mut sync, binder, staged);
                }
            }
        }

        binder.create_process(Process::clocked(
            clock,
            sync.complete("cwdecode_sync"),
        ));

        let mut comb = DefaultAlgorithmBuilder::new();

        for (field, staged) in iter::zip(&self.fields, &staged) {
            field.assemble_staged_comb(
                &mut comb,
                staged.as_ref(),
                value_word,
                &self.packer,
                self.matrix,
            );
        }

        binder.create_process(Process::comb(
            comb.complete("cwdecode_comb"),
            iter::empty(),
        ));
    }
}

/// Greedily merges pairs of groups until no admissible merge saves a bit.
/// Returns the number of generations that merged something.
fn merge_groups(
    groups: &mut [Option<SymbolTable>],
    max_sel_width: u32,
) -> usize {
    let mut candidates: BTreeMap<(usize, usize), MergeCandidate> =
        BTreeMap::new();
    let mut generation = 0;

    loop {
        let live = groups
            .iter()
            .enumerate()
            .filter_map(|(slot, group)| Some((slot, group.as_ref()?)))
            .filter(|(_, group)| group.count() > 1);

        for ((i, g0), (j, g1)) in live.tuple_combinations() {
            candidates
                .entry((i, j))
                .or_insert_with(|| MergeCandidate::new((i, j), g0, g1));
        }

        let ranked = candidates
            .values()
            .filter(|c| c.score() > 0 && c.width() <= max_sel_width)
            .sorted_by(|c0, c1| {
                c1.score().cmp(&c0.score()).then(c0.pair.cmp(&c1.pair))
            });

        let mut used = BTreeSet::new();
        let mut accepted = Vec::new();

        for candidate in ranked {
            let (i, j) = candidate.pair;

            if used.contains(&i) || used.contains(&j) {
                continue;
            }

            used.extend([i, j]);
            accepted.push(candidate.pair);
        }

        if accepted.is_empty() {
            break;
        }

        for (i, j) in accepted {
            let candidate = candidates.remove(&(i, j)).expect("cached merge");

            let (Some(g0), Some(g1)) = (groups[i].take(), groups[j].take())
            else {
                unreachable!("merge of a dead group");
            };

            log::debug!(
                "generation {generation}: merging slots {i} and {j} \
                 ({} + {} -> {} bits)",
                g0.width(),
                g1.width(),
                candidate.width(),
            );

            groups[i] = Some(candidate.realize(&g0, &g1));
        }

        candidates.retain(|(i, j), _| !used.contains(i) && !used.contains(j));
        generation += 1;
    }

    generation
}

#[cfg(test)]
mod tests {
    use malachite::Natural;
    use malachite::num::basic::traits::Zero;

    use super::*;
    use crate::decoder::{ProcessKind, VerilogModule};
    use crate::flow::Bits;

    fn lit(value: u64, width: u32) -> Bits {
        Bits::from_u64(value, width).unwrap()
    }

    fn constant(value: u64) -> Flow {
        Flow::Constant(lit(value, 4))
    }

    /// Two 4-bit targets with neutral literal 1 and the given per-step
    /// literals.
    fn pair_matrix(steps: &[(u64, u64)]) -> FlowMatrix {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));
        let b = matrix.add_signal("b", 4, lit(0, 4));

        matrix.set_neutral(a, constant(1));
        matrix.set_neutral(b, constant(1));

        for &(va, vb) in steps {
            matrix.push_step(StepFlow::from_iter([
                (a, constant(va)),
                (b, constant(vb)),
            ]));
        }

        matrix
    }

    /// Targets `a`, `b`, `c` and the source `src`, with every kind of flow.
    fn mixed_matrix() -> FlowMatrix {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 8, lit(0, 8));
        let b = matrix.add_signal("b", 8, lit(0, 8));
        let c = matrix.add_signal("c", 4, lit(0, 4));
        let src = matrix.add_signal("src", 8, lit(0, 8));

        matrix.set_neutral(a, Flow::Constant(lit(0, 8)));

        matrix.push_step(StepFlow::from_iter([
            (a, Flow::Constant(lit(5, 8))),
            (b, Flow::Forward(src)),
            (c, Flow::Raw(lit(3, 4))),
        ]));
        matrix.push_step(StepFlow::from_iter([
            (a, Flow::Raw(lit(7, 8))),
            (c, Flow::Raw(lit(3, 4))),
        ]));
        matrix.push_step(StepFlow::from_iter([
            (a, Flow::Absent),
            (b, Flow::Constant(lit(1, 8))),
            (c, Flow::Raw(lit(9, 4))),
        ]));
        matrix.push_step(StepFlow::new());

        matrix
    }

    #[test]
    fn every_step_round_trips() {
        let matrix = mixed_matrix();
        let (design, report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(design.value_word_width(), 12);
        assert_eq!(design.fields().len(), 1);
        assert_eq!(design.control_word_width(), 14);
        assert_eq!(report.generations, 2);
        assert_eq!(report.initial_selector_bits, 5);

        for step in 0..matrix.num_steps() {
            design.verify_step(step);
        }
    }

    #[test]
    fn neutral_step_encodes_as_zeros() {
        let matrix = mixed_matrix();
        let (design, _) = MicrocodeDesign::compute(&matrix, 6);

        let word = design.encode(3, matrix.flow(3));

        assert_eq!(word.bits(), &Natural::ZERO);
    }

    #[test]
    fn encoding_is_deterministic() {
        let matrix = mixed_matrix();
        let (first, first_report) = MicrocodeDesign::compute(&matrix, 6);
        let (second, second_report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(first_report, second_report);
        assert_eq!(first_report.to_string(), second_report.to_string());

        for step in 0..matrix.num_steps() {
            assert_eq!(
                first.encode(step, matrix.flow(step)),
                second.encode(step, matrix.flow(step)),
            );
        }
    }

    #[test]
    fn merge_without_savings_is_rejected() {
        let matrix = pair_matrix(&[(1, 1), (1, 2), (2, 1), (2, 1)]);
        let (design, report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(design.fields().len(), 2);
        assert_eq!(design.control_word_width(), 2);
        assert_eq!(report.generations, 0);

        for step in 0..matrix.num_steps() {
            design.verify_step(step);
        }
    }

    #[test]
    fn correlated_targets_share_a_selector() {
        let matrix = pair_matrix(&[(1, 1), (2, 2), (2, 2), (1, 1)]);
        let (design, report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(design.fields().len(), 1);
        assert_eq!(design.control_word_width(), 1);
        assert_eq!(report.generations, 1);
        assert_eq!(report.initial_selector_bits, 2);

        for step in 0..matrix.num_steps() {
            design.verify_step(step);
        }
    }

    #[test]
    fn merges_respect_the_width_bound() {
        let matrix = pair_matrix(&[(1, 1), (2, 2), (2, 2), (1, 1)]);
        let (design, _) = MicrocodeDesign::compute(&matrix, 0);

        assert_eq!(design.fields().len(), 2);
        assert!(design.fields().iter().all(|field| field.width() == 1));
    }

    #[test]
    fn merging_never_widens_the_control_word() {
        let matrix = mixed_matrix();
        let (merged, _) = MicrocodeDesign::compute(&matrix, 6);
        let (unmerged, _) = MicrocodeDesign::compute(&matrix, 0);

        assert!(merged.control_word_width() <= unmerged.control_word_width());

        for step in 0..matrix.num_steps() {
            unmerged.verify_step(step);
        }
    }

    #[test]
    #[should_panic(expected = "flow unknown to field")]
    fn unknown_flow_is_rejected() {
        let matrix = pair_matrix(&[(1, 1), (2, 2)]);
        let (design, _) = MicrocodeDesign::compute(&matrix, 6);

        let a = matrix.targets()[0];
        design.encode(0, &StepFlow::from_iter([(a, constant(9))]));
    }

    #[test]
    fn combinational_decoder() {
        let matrix = pair_matrix(&[(1, 1), (2, 2), (2, 2), (1, 1)]);
        let (mut design, _) = MicrocodeDesign::compute(&matrix, 6);

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 1);
        design.build_decoder(DecoderMode::Combinational, &mut module, cw);

        assert_eq!(module.processes().len(), 1);
        assert_eq!(module.processes()[0].function.name, "cwdecode");

        let text = module.to_string();

        assert!(text.contains("case (cw[0])"));
        assert!(text.contains("a = 4'h2;"));
        assert!(text.contains("b = 4'bx;"));
    }

    #[test]
    fn staged_decoder() {
        let matrix = mixed_matrix();
        let (mut design, _) = MicrocodeDesign::compute(&matrix, 6);

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 14);
        design.build_decoder(DecoderMode::StagedRegistered, &mut module, cw);

        let processes = module.processes();

        assert_eq!(processes.len(), 2);
        assert!(matches!(processes[0].kind, ProcessKind::Clocked { .. }));
        assert_eq!(processes[0].function.name, "cwdecode_sync");
        assert_eq!(processes[1].kind, ProcessKind::Comb);
        assert_eq!(processes[1].function.name, "cwdecode_comb");

        let text = module.to_string();

        assert!(
            text.contains("always_ff @(posedge clk) begin : cwdecode_sync\n")
        );
        assert!(text.contains("D1_CW <= cw[11:0];"));
        assert!(text.contains("D2_CW <= D1_CW;"));
        assert!(text.contains("case (MUXReg0)"));
        assert!(text.contains("4'h0: begin"));
        assert!(text.contains("a = D2_CW[7:0];"));
    }

    /// A 4-bit target `a` whose neutral flow keeps the literal 5 in its lane,
    /// overridden by the given constants.
    fn raw_neutral_matrix(steps: &[u64]) -> FlowMatrix {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));

        matrix.set_neutral(a, Flow::Raw(lit(5, 4)));

        for &value in steps {
            matrix.push_step(StepFlow::from_iter([(a, constant(value))]));
        }

        matrix
    }

    #[test]
    fn conflicting_literals_get_disjoint_lanes() {
        let matrix = mixed_matrix();
        let (design, report) = MicrocodeDesign::compute(&matrix, 6);

        let lanes: Vec<_> = design.lanes().collect();
        let (a, c) = (matrix.targets()[0], matrix.targets()[2]);

        assert_eq!(
            lanes,
            vec![
                (a, Lane { offset: 0, width: 8 }),
                (c, Lane { offset: 8, width: 4 }),
            ],
        );
        assert_eq!(report.control_word_width(), design.control_word_width());
    }

    #[test]
    fn neutral_lane_survives_overriding_steps() {
        let matrix = raw_neutral_matrix(&[1, 2]);
        let (mut design, report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(design.value_word_width(), 4);
        assert_eq!(design.control_word_width(), 6);
        assert_eq!(report.control_word_width(), 6);

        for step in 0..matrix.num_steps() {
            design.verify_step(step);
        }

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 6);
        design.build_decoder(DecoderMode::Combinational, &mut module, cw);

        let text = module.to_string();

        assert!(text.contains("case (cw[5:4])"));
        assert!(text.contains("2'h0: begin\n      a = cw[3:0];"));
        assert!(text.contains("a = 4'h2;"));
    }

    #[test]
    fn neutral_lane_without_steps() {
        let matrix = raw_neutral_matrix(&[]);
        let (mut design, report) = MicrocodeDesign::compute(&matrix, 6);

        assert_eq!(report.steps, 0);
        assert_eq!(design.value_word_width(), 4);
        assert_eq!(design.control_word_width(), 4);

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 4);
        design.build_decoder(DecoderMode::Combinational, &mut module, cw);

        assert!(module.to_string().contains("  a = cw[3:0];\n"));
    }

    #[test]
    fn two_stage_decoder() {
        let matrix = mixed_matrix();
        let (mut design, _) = MicrocodeDesign::compute(&matrix, 6);

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 14);
        design.build_decoder(DecoderMode::Staged, &mut module, cw);

        assert_eq!(module.processes().len(), 2);

        let text = module.to_string();

        assert!(text.contains("D1_CW <= cw[11:0];"));
        assert!(text.contains("case (cw[13:12])"));
        assert!(text.contains("MUXSymbol0 <= 4'h1;"));
        assert!(text.contains("MUXSymbol0 <= 4'bx;"));
        assert!(text.contains("case (MUXSymbol0)"));
        assert!(text.contains("4'h0: begin"));
        assert!(text.contains("a = D1_CW[7:0];"));
        assert!(text.contains("c = D1_CW[11:8];"));
        assert!(!text.contains("D2_CW"));
        assert!(!text.contains("MUXReg"));
    }

    #[test]
    #[should_panic(expected = "decoder built twice")]
    fn decoder_is_built_once() {
        let matrix = pair_matrix(&[(1, 1)]);
        let (mut design, _) = MicrocodeDesign::compute(&matrix, 6);

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 1);

        design.build_decoder(DecoderMode::Combinational, &mut module, cw);
        design.build_decoder(DecoderMode::Combinational, &mut module, cw);
    }
}
