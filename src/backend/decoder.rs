//! Control-word decoder as a Verilog primitive.

use calyx_ir as ir;
use itertools::Itertools;

use crate::decoder::{DecoderMode, Direction, Port, PortUsage, VerilogModule};

/// Builds a primitive whose body is the rendered decoder of `module`.
pub fn compile_decoder(
    name: ir::Id,
    module: &VerilogModule,
    mode: DecoderMode,
) -> ir::Primitive {
    let ports = module.ports();

    ir::Primitive {
        name,
        params: vec![],
        signature: ports.iter().map(port_def).collect(),
        attributes: Default::default(),
        is_comb: !mode.is_staged(),
        latency: None,
        body: Some(format_body(module)),
    }
}

/// The printer indents the first line of a body; the rest carry their own
/// indentation.
fn format_body(module: &VerilogModule) -> String {
    module.to_string().lines().join("\n  ")
}

fn port_def(port: &Port) -> ir::PortDef<ir::Width> {
    let mut attributes = ir::Attributes::default();

    if port.usage == PortUsage::Clock {
        attributes.insert(ir::Attribute::Bool(ir::BoolAttr::Clk), 1);
    }

    let direction = match port.direction {
        Direction::Input => ir::Direction::Input,
        Direction::Output => ir::Direction::Output,
    };

    ir::PortDef::new(
        ir::Id::new(&port.name),
        ir::Width::Const {
            value: u64::from(port.width),
        },
        direction,
        attributes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{
        AlgorithmBuilder, DefaultAlgorithmBuilder, Expr, Process, SignalBinder,
        Wire,
    };
    use crate::flow::{Bits, FlowMatrix};

    #[test]
    fn body_is_indented_like_the_rom() {
        let mut matrix = FlowMatrix::new();
        let out = matrix.add_signal("out", 2, Bits::zero(2));

        let mut module = VerilogModule::new(&matrix);
        let cw = module.signal(PortUsage::Input, "cw", 2);

        let mut builder = DefaultAlgorithmBuilder::new();
        builder.store(Wire::Design(out), Expr::Read(cw));
        module.create_process(Process::comb(builder.complete("dec"), [cw]));

        let primitive =
            compile_decoder(ir::Id::new("dec"), &module, DecoderMode::default());

        assert!(primitive.is_comb);
        assert_eq!(
            primitive.body.as_deref(),
            Some("always_comb begin : dec\n    out = cw;\n  end"),
        );
    }
}
