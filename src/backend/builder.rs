//! IR builder based on [`calyx_ir::Builder`].

use calyx_ir as ir;

use crate::utils::Diagnostic;

pub struct IRBuilder<'a> {
    pub component: &'a mut ir::Component,
    pub lib: &'a mut ir::LibrarySignatures,
}

impl<'a> IRBuilder<'a> {
    pub fn new(
        component: &'a mut ir::Component,
        lib: &'a mut ir::LibrarySignatures,
    ) -> IRBuilder<'a> {
        IRBuilder { component, lib }
    }

    /// Instantiates the library primitive `primitive`.
    pub fn add_primitive<S, T>(
        &mut self,
        prefix: S,
        primitive: T,
    ) -> Result<ir::RRC<ir::Cell>, Diagnostic>
    where
        S: Into<ir::Id>,
        T: Into<ir::Id>,
    {
        let primitive = primitive.into();

        let definition = self.lib.find_primitive(primitive).ok_or_else(|| {
            Diagnostic::bug()
                .with_message(format!("undefined primitive `{primitive}`"))
        })?;

        let (parameters, ports) = definition.resolve(&[]).map_err(|err| {
            Diagnostic::bug()
                .with_message(format!("cannot instantiate `{primitive}`"))
                .with_note(format!("{err:?}"))
        })?;

        let prototype = ir::CellType::Primitive {
            name: primitive,
            param_binding: Box::new(parameters),
            is_comb: definition.is_comb,
            latency: definition.latency,
        };

        let name = self.component.generate_name(prefix);

        let cell = ir::rrc(ir::Cell::new(name, prototype));
        add_ports_to_cell(&cell, ports);

        self.component.cells.add(cell.clone());

        Ok(cell)
    }

    #[inline]
    pub fn add_continuous_assignments<I>(&mut self, assignments: I)
    where
        I: IntoIterator<Item = ir::Assignment<ir::Nothing>>,
    {
        self.component.continuous_assignments.extend(assignments);
    }

    /// For compatibility with [`calyx_ir::build_assignments`].
    pub fn build_assignment<T>(
        &self,
        dst: ir::RRC<ir::Port>,
        src: ir::RRC<ir::Port>,
        guard: ir::Guard<T>,
    ) -> ir::Assignment<T> {
        ir::Assignment {
            dst,
            src,
            guard: Box::new(guard),
            attributes: Default::default(),
        }
    }
}

fn add_ports_to_cell<I>(cell: &ir::RRC<ir::Cell>, ports: I)
where
    I: IntoIterator<Item = ir::PortDef<u64>>,
{
    let wrc = ir::WRC::from(cell);
    let cell_ports = &mut cell.borrow_mut().ports;

    for port in ports {
        let port = ir::rrc(ir::Port {
            name: port.name(),
            width: port.width,
            direction: port.direction,
            parent: ir::PortParent::Cell(wrc.clone()),
            attributes: port.attributes,
        });

        cell_ports.push(port);
    }
}
