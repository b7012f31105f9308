use std::cmp;
use std::io;

use calyx_ir::{self as ir, build_assignments};
use calyx_utils::NameGenerator;

use super::decoder::compile_decoder;
use super::rom::MicrocodeRom;
use super::IRBuilder;
use crate::decoder::{
    DecoderMode, Direction, Port, PortUsage, SignalBinder, VerilogModule,
};
use crate::encoding::{EncodingReport, MicrocodeDesign};
use crate::flow::FlowMatrix;
use crate::utils::Diagnostic;

/// Parameters of a generated controlpath.
#[derive(Clone, Debug)]
pub struct ControlpathConfig {
    /// Name of the generated component. The ROM and decoder primitives are
    /// named after it.
    pub name: String,
    /// Bound on the width of merged selector fields.
    pub max_sel_width: u32,
    pub mode: DecoderMode,
}

impl Default for ControlpathConfig {
    fn default() -> Self {
        ControlpathConfig {
            name: String::from("controlpath"),
            max_sel_width: 6,
            mode: DecoderMode::Combinational,
        }
    }
}

pub struct Program {
    context: ir::Context,
    report: EncodingReport,
    rom: MicrocodeRom,
    mode: DecoderMode,
}

impl Program {
    pub fn write<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        ir::Printer::write_context(&self.context, true, out)
    }

    pub fn write_rom<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.rom.write_image(out)
    }

    pub fn report(&self) -> &EncodingReport {
        &self.report
    }

    pub fn rom(&self) -> &MicrocodeRom {
        &self.rom
    }

    /// Cycles from presenting an address to the decoded flow of its step,
    /// counting the registered ROM read.
    pub fn latency(&self) -> u32 {
        1 + self.mode.latency()
    }
}

/// Compiles `matrix` into a component that reads control words from a
/// microcode ROM and decodes them into the flows of each step. Every ROM row
/// is checked against the flow it encodes.
pub fn compile_microcode(
    matrix: &FlowMatrix,
    config: &ControlpathConfig,
) -> Result<Program, Diagnostic> {
    matrix.validate()?;

    let (mut design, report) =
        MicrocodeDesign::compute(matrix, config.max_sel_width);

    let width = design.control_word_width();

    let mut module = VerilogModule::new(matrix);
    let cw = module.signal(PortUsage::Input, "cw", cmp::max(width, 1));
    design.build_decoder(config.mode, &mut module, cw);

    let mut rom = MicrocodeRom::new(matrix.num_steps(), width);

    for step in 0..matrix.num_steps() {
        design.verify_step(step);
        rom.pre_write(step, design.encode(step, matrix.flow(step)));
    }

    log::info!(
        "{} ROM rows of {} bits, decoder latency {}",
        rom.depth(),
        width,
        config.mode.latency(),
    );

    let mut lib = ir::LibrarySignatures::default();

    let rom_name = ir::Id::new(format!("{}_rom", config.name));
    let decoder_name = ir::Id::new(format!("{}_decoder", config.name));

    lib.add_inline_primitive(rom.build(rom_name)).set_source();
    lib.add_inline_primitive(compile_decoder(
        decoder_name,
        &module,
        config.mode,
    ))
    .set_source();

    let component = build_component(
        ir::Id::new(&config.name),
        &module.ports(),
        (&rom, rom_name),
        decoder_name,
        &mut lib,
    )?;

    Ok(Program {
        context: ir::Context {
            components: vec![component],
            lib,
            bc: Default::default(),
            entrypoint: ir::Id::new(&config.name),
            extra_opts: Vec::new(),
            metadata: None,
        },
        report,
        rom,
        mode: config.mode,
    })
}

fn build_component(
    name: ir::Id,
    decoder_ports: &[Port],
    (rom, rom_name): (&MicrocodeRom, ir::Id),
    decoder_name: ir::Id,
    lib: &mut ir::LibrarySignatures,
) -> Result<ir::Component, Diagnostic> {
    let design_ports: Vec<_> = decoder_ports
        .iter()
        .filter(|port| port.usage == PortUsage::Default)
        .collect();

    let mut names = NameGenerator::with_prev_defined_names(
        design_ports
            .iter()
            .map(|port| ir::Id::new(&port.name))
            .collect(),
    );

    let addr = names.gen_name("addr");
    let rd_en = names.gen_name("rd_en");

    let mut ports = vec![
        ir::PortDef::new(
            addr,
            u64::from(rom.addr_width()),
            ir::Direction::Input,
            Default::default(),
        ),
        ir::PortDef::new(rd_en, 1, ir::Direction::Input, Default::default()),
    ];

    ports.extend(design_ports.iter().map(|port| {
        let direction = match port.direction {
            Direction::Input => ir::Direction::Input,
            Direction::Output => ir::Direction::Output,
        };

        ir::PortDef::new(
            ir::Id::new(&port.name),
            u64::from(port.width),
            direction,
            Default::default(),
        )
    }));

    let mut component = ir::Component::new(name, ports, false, false, None);
    let mut builder = IRBuilder::new(&mut component, lib);

    let rom = builder.add_primitive("rom", rom_name)?;
    let decoder = builder.add_primitive("decoder", decoder_name)?;

    let signature = &builder.component.signature;

    let mut assigns: Vec<_> = build_assignments!(builder;
        rom["addr"] = ? signature[addr];
        rom["rd_en"] = ? signature[rd_en];
    )
    .into();

    for port in decoder_ports {
        let id = ir::Id::new(&port.name);

        let (dst, src) = match (port.usage, port.direction) {
            // Connected by Calyx's clock insertion.
            (PortUsage::Clock, _) => continue,
            (PortUsage::Input, _) => {
                (decoder.borrow().get(id), rom.borrow().get("data_out"))
            }
            (PortUsage::Default, Direction::Input) => {
                (decoder.borrow().get(id), signature.borrow().get(id))
            }
            (PortUsage::Default, Direction::Output) => {
                (signature.borrow().get(id), decoder.borrow().get(id))
            }
        };

        assigns.push(builder.build_assignment(dst, src, ir::Guard::True));
    }

    builder.add_continuous_assignments(assigns);

    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Bits, Flow, StepFlow};

    fn lit(value: u64, width: u32) -> Bits {
        Bits::from_u64(value, width).unwrap()
    }

    fn matrix() -> FlowMatrix {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));
        let b = matrix.add_signal("b", 8, lit(0, 8));
        let src = matrix.add_signal("src", 8, lit(0, 8));

        matrix.push_step(StepFlow::from_iter([
            (a, Flow::Constant(lit(3, 4))),
            (b, Flow::Forward(src)),
        ]));
        matrix.push_step(StepFlow::from_iter([(b, Flow::Raw(lit(200, 8)))]));
        matrix.push_step(StepFlow::new());

        matrix
    }

    #[test]
    fn rom_holds_every_step() {
        let matrix = matrix();
        let program =
            compile_microcode(&matrix, &ControlpathConfig::default()).unwrap();

        assert_eq!(program.rom().depth(), 3);
        assert!((0..3).all(|addr| program.rom().row(addr).is_some()));
        assert_eq!(program.report().steps, 3);
        assert_eq!(program.latency(), 1);

        let mut image = Vec::new();
        program.write_rom(&mut image).unwrap();

        assert_eq!(String::from_utf8(image).unwrap().lines().count(), 3);
    }

    #[test]
    fn writes_component() {
        let config = ControlpathConfig {
            name: String::from("hma"),
            mode: DecoderMode::Staged,
            ..Default::default()
        };

        let program = compile_microcode(&matrix(), &config).unwrap();

        let mut out = Vec::new();
        program.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("component hma("));
        assert!(text.contains("rd_en: 1"));
        assert!(text.contains("hma_rom()"));
        assert!(text.contains("hma_decoder()"));
        assert_eq!(program.latency(), 2);
    }

    #[test]
    fn neutral_lane_without_steps_compiles() {
        let mut matrix = FlowMatrix::new();
        let a = matrix.add_signal("a", 4, lit(0, 4));
        matrix.set_neutral(a, Flow::Raw(lit(5, 4)));

        let program =
            compile_microcode(&matrix, &ControlpathConfig::default()).unwrap();

        assert_eq!(program.rom().depth(), 0);
        assert_eq!(program.report().value_bits, 4);
        assert_eq!(program.report().control_word_width(), 4);
    }

    #[test]
    fn invalid_matrix_is_rejected() {
        let mut matrix = matrix();
        let a = matrix.targets()[0];
        matrix.push_step(StepFlow::from_iter([(a, Flow::Raw(lit(1, 2)))]));

        let Err(err) = compile_microcode(&matrix, &Default::default()) else {
            panic!("expected a diagnostic");
        };

        assert!(err.message().starts_with("invalid flow"));
    }
}
