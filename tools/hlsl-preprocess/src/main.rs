use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use shader_engine::{BuiltinPreprocessor, ShadercPreprocessor};
use shader_harness::{PreprocessJob, Preprocessor, SearchPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Built-in directive preprocessor.
    Builtin,
    /// shaderc's HLSL preprocessor (requires the `shaderc` feature).
    Shaderc,
}

#[derive(Debug, Parser)]
#[command(name = "hlsl-preprocess")]
#[command(about = "Expand macros and includes in an HLSL source file")]
struct Cli {
    /// Add an include directory, searched after the current directory in the order given.
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Predefine a macro (NAME=VALUE).
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    define: Vec<String>,

    /// Preprocessor implementation.
    #[arg(long, value_enum, default_value_t = Backend::Builtin)]
    backend: Backend,

    /// Source file.
    source: PathBuf,

    /// Output file; created or truncated.
    target: PathBuf,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let job = PreprocessJob {
        source: cli.source.clone(),
        target: cli.target.clone(),
        defines: cli.define.clone(),
        search_path: SearchPath::with_dirs(&cli.include),
    };
    job.validate().context("invalid arguments")?;

    let engine: Box<dyn Preprocessor> = match cli.backend {
        Backend::Builtin => Box::new(BuiltinPreprocessor::default()),
        Backend::Shaderc if !ShadercPreprocessor::is_available() => {
            bail!("shaderc backend is not enabled; rebuild with `--features shaderc`")
        }
        Backend::Shaderc => Box::new(ShadercPreprocessor),
    };
    tracing::debug!(backend = ?cli.backend, "selected preprocessor");

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    job.run(engine.as_ref(), &mut out, &mut err)?;
    out.flush().context("failed to flush stdout")?;
    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version requests are not errors.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(()) => {
            println!(
                "Preprocessed {} to {}",
                cli.source.display(),
                cli.target.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to preprocess {}: {err:#}", cli.source.display());
            ExitCode::FAILURE
        }
    }
}
