use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};

mod cmd;

use cmd::{ExitCode, Format, Mode, Which};

/// Statically check a tree-to-tree transformation stylesheet against a
/// source and target schema for type preservation and validity.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Validate a transformation stylesheet against a source and target schema"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline, or (with `--mode`) a single diagnostic stage.
    Analyze {
        source_schema: PathBuf,
        target_schema: PathBuf,
        stylesheet: PathBuf,
        /// Which stage to run: the full pipeline, or one diagnostic endpoint.
        #[arg(long, value_enum, default_value = "full")]
        mode: Mode,
        #[arg(long, value_enum, default_value = "human")]
        format: Format,
        /// Print the raw `Debug` representation instead of the pretty report.
        #[arg(long)]
        debug: bool,
    },
    /// Translate a schema into a regular tree grammar and dump it as a tree.
    DumpGrammar {
        schema: PathBuf,
        #[arg(long, value_enum, default_value = "source")]
        which: Which,
    },
    /// Translate the stylesheet into a macro tree transducer and dump it as a tree.
    DumpMtt { stylesheet: PathBuf },
}

fn main() -> ProcessExitCode {
    env_logger::init();
    info!("starting xform-typecheck");

    let args = Args::parse();
    debug!("parsed command line arguments: {:?}", args);

    let result = match args.command {
        Command::Analyze {
            source_schema,
            target_schema,
            stylesheet,
            mode,
            format,
            debug: debug_mode,
        } => cmd::analyze(&source_schema, &target_schema, &stylesheet, mode, format, debug_mode),
        Command::DumpGrammar { schema, which } => cmd::dump_grammar(&schema, which),
        Command::DumpMtt { stylesheet } => cmd::dump_mtt(&stylesheet),
    };

    match result {
        Ok(code) => {
            debug!("xform-typecheck finished with exit code {}", code.code());
            ProcessExitCode::from(code.code() as u8)
        }
        Err(e) => {
            eprintln!("{}", format!("error: {}", e).red());
            ProcessExitCode::from(ExitCode::InputMalformation.code() as u8)
        }
    }
}
