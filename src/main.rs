use std::error::Error as _;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use md2pdf::{Config, Conversion, ConvertError, convert_markdown_to_pdf};

#[derive(Parser)]
#[command(name = "md2pdf", version)]
#[command(about = "Convert a Markdown file into a styled PDF")]
struct Cli {
    #[arg(help = "Input Markdown file (.md or .markdown)")]
    input: String,
    #[arg(help = "Output PDF file (defaults to the input path with a .pdf extension)")]
    output: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing();

    match run(&cli) {
        Ok(conversion) => {
            println!("✓ PDF created successfully: {}", conversion.output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            let mut cause = err.source();
            while let Some(inner) = cause {
                debug!(cause = %inner, "caused by");
                cause = inner.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Conversion, ConvertError> {
    let config = Config::from_env()?;
    convert_markdown_to_pdf(&cli.input, cli.output.as_deref(), &config)
}

/// Diagnostics go to stderr so stdout carries only the confirmation line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
