//! Microcode ROM as a Verilog primitive.

use std::cmp;
use std::fmt::Write;
use std::io;

use calyx_ir as ir;

use crate::flow::ControlWord;
use crate::utils::ceil_log2;

/// A read-only memory holding one control word per control step. Reads are
/// registered: `data_out` shows the row at `addr` one cycle after `rd_en`.
pub struct MicrocodeRom {
    word_width: u32,
    rows: Vec<Option<ControlWord>>,
}

impl MicrocodeRom {
    pub fn new(depth: usize, word_width: u32) -> MicrocodeRom {
        MicrocodeRom {
            word_width,
            rows: vec![None; depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.rows.len()
    }

    pub fn addr_width(&self) -> u32 {
        cmp::max(ceil_log2(cmp::max(self.rows.len(), 1)), 1)
    }

    /// Width of the `data_out` port.
    pub fn data_width(&self) -> u32 {
        cmp::max(self.word_width, 1)
    }

    /// Loads `word` into row `addr` before synthesis.
    pub fn pre_write(&mut self, addr: usize, word: ControlWord) {
        assert!(
            addr < self.rows.len(),
            "address {addr} out of range for {}-row ROM",
            self.rows.len(),
        );
        assert_eq!(
            word.width(),
            self.word_width,
            "control word width mismatch at address {addr}",
        );

        self.rows[addr] = Some(word);
    }

    pub fn row(&self, addr: usize) -> Option<&ControlWord> {
        self.rows[addr].as_ref()
    }

    fn body(&self) -> String {
        let mut body = String::from(concat!(
            "always_ff @(posedge clk) begin\n",
            "    if (rd_en) begin\n",
            "      case (addr)\n",
        ));

        let (addr_width, data_width) = (self.addr_width(), self.data_width());

        for (addr, row) in self.rows.iter().enumerate() {
            if let Some(word) = row {
                writeln!(
                    body,
                    "        {addr_width}'d{addr}: data_out <= {data_width}'h{};",
                    word,
                )
                .unwrap();
            }
        }

        body.push_str(concat!(
            "        default: data_out <= 'x;\n",
            "      endcase\n",
            "    end\n",
            "  end",
        ));

        body
    }

    pub fn build(&self, name: ir::Id) -> ir::Primitive {
        let mut clk = ir::Attributes::default();
        let mut data = ir::Attributes::default();

        clk.insert(ir::Attribute::Bool(ir::BoolAttr::Clk), 1);
        data.insert(ir::Attribute::Bool(ir::BoolAttr::Data), 1);

        let port = |name: &str, width: u32, direction, attributes| {
            ir::PortDef::new(
                name,
                ir::Width::Const {
                    value: u64::from(width),
                },
                direction,
                attributes,
            )
        };

        ir::Primitive {
            name,
            params: vec![],
            signature: vec![
                port("clk", 1, ir::Direction::Input, clk),
                port("addr", self.addr_width(), ir::Direction::Input, data),
                port("rd_en", 1, ir::Direction::Input, Default::default()),
                port(
                    "data_out",
                    self.data_width(),
                    ir::Direction::Output,
                    Default::default(),
                ),
            ],
            attributes: Default::default(),
            is_comb: false,
            latency: None,
            body: Some(self.body()),
        }
    }

    /// Writes the ROM contents in `$readmemh` format, one row per line.
    /// Rows never written read as zero.
    pub fn write_image<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let zero = ControlWord::zeros(self.word_width);

        for row in &self.rows {
            writeln!(out, "{}", row.as_ref().unwrap_or(&zero))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Bits;

    fn word(value: u64, width: u32) -> ControlWord {
        let mut word = ControlWord::zeros(width);
        word.write(0, &Bits::from_u64(value, width).unwrap());
        word
    }

    #[test]
    fn address_width_is_at_least_one() {
        assert_eq!(MicrocodeRom::new(1, 4).addr_width(), 1);
        assert_eq!(MicrocodeRom::new(2, 4).addr_width(), 1);
        assert_eq!(MicrocodeRom::new(5, 4).addr_width(), 3);
        assert_eq!(MicrocodeRom::new(3, 0).data_width(), 1);
    }

    #[test]
    fn image_and_body() {
        let mut rom = MicrocodeRom::new(3, 12);
        rom.pre_write(0, word(0xabc, 12));
        rom.pre_write(2, word(0x5, 12));

        let mut image = Vec::new();
        rom.write_image(&mut image).unwrap();

        assert_eq!(String::from_utf8(image).unwrap(), "abc\n000\n005\n");

        let body = rom.body();

        assert!(body.contains("2'd0: data_out <= 12'habc;"));
        assert!(body.contains("2'd2: data_out <= 12'h005;"));
        assert!(!body.contains("2'd1:"));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn write_past_the_end() {
        let mut rom = MicrocodeRom::new(2, 4);
        rom.pre_write(2, word(1, 4));
    }

    #[test]
    #[should_panic(expected = "width mismatch")]
    fn write_of_wrong_width() {
        let mut rom = MicrocodeRom::new(2, 4);
        rom.pre_write(0, word(1, 5));
    }
}
