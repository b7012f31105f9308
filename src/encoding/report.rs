use std::collections::BTreeMap;
use std::fmt;

/// Summary of a computed encoding.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EncodingReport {
    pub steps: usize,
    pub max_sel_width: u32,
    /// Selector bits with one field per target.
    pub initial_selector_bits: u32,
    /// Value bits with one lane per target.
    pub initial_value_bits: u32,
    pub generations: usize,
    pub selector_bits: u32,
    pub value_bits: u32,
    /// The number of fields of every selector width.
    pub histogram: BTreeMap<u32, usize>,
}

impl EncodingReport {
    pub fn widest_selector(&self) -> u32 {
        self.histogram.keys().copied().max().unwrap_or(0)
    }

    pub fn control_word_width(&self) -> u32 {
        self.selector_bits + self.value_bits
    }
}

impl fmt::Display for EncodingReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Horizontal microcode encoding")?;
        writeln!(f, "  c-steps: {}", self.steps)?;
        writeln!(f, "  selector width bound: {}", self.max_sel_width)?;
        writeln!(
            f,
            "  uncompressed CW: {} selector bits + {} value bits",
            self.initial_selector_bits, self.initial_value_bits,
        )?;
        writeln!(f, "  merge generations: {}", self.generations)?;
        writeln!(
            f,
            "  compressed CW: {} selector bits + {} value bits",
            self.selector_bits, self.value_bits,
        )?;
        writeln!(f, "  widest selector: {}", self.widest_selector())?;
        writeln!(f, "selector width; number of fields")?;

        for (width, count) in self.histogram.iter().rev() {
            writeln!(f, "{width}; {count}")?;
        }

        Ok(())
    }
}
