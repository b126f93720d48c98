use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shader_engine::BuiltinEngine;
use shader_harness::{parse_bytecode, render_report};

#[derive(Debug, Parser)]
#[command(name = "shader-testparse")]
#[command(about = "Dump the reflection data of compiled D3D shaders and effects")]
struct Cli {
    /// Target profile (d3d, bytecode, glsl, glsl120, arb1, nv2, nv3, nv4).
    profile: String,

    /// Compiled shader or effect files.
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

/// Returns the files that could not be read or parsed cleanly.
fn run(cli: &Cli, out: &mut dyn Write) -> Result<Vec<PathBuf>> {
    let engine = BuiltinEngine::default();
    let mut failed = Vec::new();

    writeln!(out, "shader-testparse {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;

    for file in &cli.files {
        let name = file.display().to_string();
        let bytes = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(file = %name, error = %err, "read failed");
                writeln!(out, " ... fopen('{name}') failed.")?;
                failed.push(file.clone());
                continue;
            }
        };

        let parsed = parse_bytecode(&engine, &cli.profile, &bytes);
        out.write_all(render_report(&name, &parsed).as_bytes())
            .with_context(|| format!("failed to write report for {name}"))?;
        if !parsed.is_ok() {
            failed.push(file.clone());
        }
    }

    out.flush().context("failed to flush stdout")?;
    Ok(failed)
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&cli, &mut out) {
        Ok(failed) if failed.is_empty() => ExitCode::SUCCESS,
        Ok(failed) => {
            for file in &failed {
                eprintln!("failed: {}", file.display());
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("shader-testparse: {err:#}");
            ExitCode::FAILURE
        }
    }
}
