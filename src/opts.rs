use std::path::PathBuf;

use argh::FromArgs;
use log::LevelFilter;

use crate::backend::ControlpathConfig;
use crate::decoder::DecoderMode;

/// Horizontally microcoded controlpath generator for Calyx.
#[derive(FromArgs)]
pub struct Opts {
    /// input flow file
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file
    #[argh(option, short = 'o')]
    pub output: Option<PathBuf>,

    /// write the ROM image in $readmemh format
    #[argh(option)]
    pub rom: Option<PathBuf>,

    /// write the encoding report
    #[argh(option)]
    pub report: Option<PathBuf>,

    /// maximum width of a merged selector field
    #[argh(option, default = "6")]
    pub max_sel_width: u32,

    /// decoder structure: comb, staged, or registered
    #[argh(option, default = "DecoderMode::Combinational")]
    pub decoder: DecoderMode,

    /// name of the generated component
    #[argh(option, default = "String::from(\"controlpath\")")]
    pub name: String,

    /// logging level
    #[argh(option, long = "log", default = "LevelFilter::Warn")]
    pub log_level: LevelFilter,
}

impl Opts {
    /// Parse options from `env::args`.
    pub fn parse() -> Opts {
        argh::from_env()
    }

    pub fn config(&self) -> ControlpathConfig {
        ControlpathConfig {
            name: self.name.clone(),
            max_sel_width: self.max_sel_width,
            mode: self.decoder,
        }
    }
}
