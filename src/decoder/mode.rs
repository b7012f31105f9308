use strum_macros::{Display, EnumString};

/// How the control word is decoded.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Display, EnumString)]
pub enum DecoderMode {
    /// Decoded outputs follow the control word within the same cycle.
    #[default]
    #[strum(serialize = "comb")]
    Combinational,
    /// Selector symbols are registered, adding one cycle of latency.
    #[strum(serialize = "staged")]
    Staged,
    /// Selector symbols are registered twice, adding two cycles of latency.
    #[strum(serialize = "registered")]
    StagedRegistered,
}

impl DecoderMode {
    /// Cycles between a control word appearing and its decoded outputs.
    pub fn latency(self) -> u32 {
        match self {
            DecoderMode::Combinational => 0,
            DecoderMode::Staged => 1,
            DecoderMode::StagedRegistered => 2,
        }
    }

    pub fn is_staged(self) -> bool {
        self != DecoderMode::Combinational
    }
}
