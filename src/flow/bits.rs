//! Literals and control words.

use std::fmt;

use malachite::num::basic::traits::{One, Zero};
use malachite::num::logic::traits::{LowMask, SignificantBits};
use malachite::Natural;

/// An unsigned literal of a fixed width.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Bits {
    value: Natural,
    width: u32,
}

impl Bits {
    /// Returns `None` if `value` does not fit in `width` bits.
    pub fn new(value: Natural, width: u32) -> Option<Bits> {
        (value.significant_bits() <= u64::from(width))
            .then_some(Bits { value, width })
    }

    pub fn from_u64(value: u64, width: u32) -> Option<Bits> {
        Bits::new(Natural::from(value), width)
    }

    pub fn zero(width: u32) -> Bits {
        Bits {
            value: Natural::ZERO,
            width,
        }
    }

    /// A `width`-bit vector with only bit `index` set.
    pub fn one_hot(index: u32, width: u32) -> Bits {
        assert!(index < width, "one-hot index {index} out of {width} bits");

        Bits {
            value: Natural::ONE << index,
            width,
        }
    }

    pub fn value(&self) -> &Natural {
        &self.value
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}'h{:x}", self.width, self.value)
    }
}

/// The bit vector stored at one ROM address. Bit 0 is the least-significant
/// bit of the value word.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ControlWord {
    bits: Natural,
    width: u32,
}

impl ControlWord {
    pub fn zeros(width: u32) -> ControlWord {
        ControlWord {
            bits: Natural::ZERO,
            width,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn bits(&self) -> &Natural {
        &self.bits
    }

    /// Extracts the field `[offset, offset + width)`.
    pub fn read(&self, offset: u32, width: u32) -> Natural {
        assert!(
            offset + width <= self.width,
            "field [{offset}, {}) exceeds {}-bit control word",
            offset + width,
            self.width,
        );

        (&self.bits >> offset) & Natural::low_mask(u64::from(width))
    }

    /// Stores `value` at `offset`. A field may be written more than once only
    /// with the same value.
    pub fn write(&mut self, offset: u32, value: &Bits) {
        let current = self.read(offset, value.width());

        assert!(
            current == Natural::ZERO || &current == value.value(),
            "conflicting writes to control word field at offset {offset}: \
             {current:x} and {:x}",
            value.value(),
        );

        self.bits |= value.value() << offset;
    }
}

impl fmt::Display for ControlWord {
    /// Formats the word as zero-padded hexadecimal digits.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let digits = usize::try_from(self.width.max(1).div_ceil(4))
            .map_err(|_| fmt::Error)?;
        let hex = format!("{:x}", self.bits);

        write!(f, "{hex:0>digits$}")
    }
}
