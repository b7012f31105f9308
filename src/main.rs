use std::borrow::Cow;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use calyx_microcode::backend::{self, Program};
use calyx_microcode::opts::Opts;
use calyx_microcode::syntax::{self, FlowParser};
use calyx_microcode::utils::{Diagnostic, Reporter, Span};

fn read_input(file: &Option<PathBuf>) -> io::Result<(Cow<'_, str>, String)> {
    if let Some(file) = file {
        let filename = file.to_string_lossy();
        let src = fs::read_to_string(file)?;

        Ok((filename, src))
    } else {
        let filename = Cow::from("<stdin>");
        let src = io::read_to_string(io::stdin())?;

        Ok((filename, src))
    }
}

fn write_output(program: &Program, file: &Option<PathBuf>) -> io::Result<()> {
    let mut out: Box<dyn io::Write> = if let Some(path) = file {
        Box::new(File::create(path)?)
    } else {
        Box::new(io::stdout())
    };

    program.write(&mut out)
}

fn write_artifacts(program: &Program, opts: &Opts) -> io::Result<()> {
    if let Some(path) = &opts.rom {
        program.write_rom(&mut File::create(path)?)?;
    }

    if let Some(path) = &opts.report {
        fs::write(path, program.report().to_string())?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    env_logger::Builder::new()
        .filter_level(opts.log_level)
        .init();

    let (filename, src) = match read_input(&opts.file) {
        Ok(result) => result,
        Err(err) => {
            Reporter::new("", "").emit(&Diagnostic::from(err));

            return ExitCode::FAILURE;
        }
    };

    let mut reporter = Reporter::new(&filename, &src);

    let file = match FlowParser::parse_file(&src) {
        Ok(result) => result,
        Err(err) => {
            reporter.emit(
                &Diagnostic::error()
                    .with_message("syntax error")
                    .with_primary(
                        Span::from(err.location),
                        err.variant.message(),
                    ),
            );

            return ExitCode::FAILURE;
        }
    };

    let Some(matrix) = syntax::lower_ast(&file, &mut reporter) else {
        return ExitCode::FAILURE;
    };

    let program = match backend::compile_microcode(&matrix, &opts.config()) {
        Ok(program) => program,
        Err(err) => {
            reporter.emit(&err);

            return ExitCode::FAILURE;
        }
    };

    let written = write_output(&program, &opts.output)
        .and_then(|()| write_artifacts(&program, &opts));

    if let Err(err) = written {
        reporter.emit(&Diagnostic::from(err));

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
