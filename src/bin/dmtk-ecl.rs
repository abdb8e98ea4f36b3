//! Script CLI (EXPANSION → "CLI surface"), a thin wrapper over
//! [`dmtk::script`]'s assemble/disassemble pair.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dmtk::io::Io;
use dmtk::script;

#[derive(Parser)]
#[command(name = "dmtk-ecl", about = "Assemble and disassemble danmaku scripts")]
struct Cli {
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Binary ECL module → textual DSL.
    Disassemble {
        input: PathBuf,
        #[arg(long)]
        version: u32,
        #[arg(long)]
        map: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "utf8")]
        encoding: Encoding,
    },
    /// Textual DSL → a disassembly-equivalent report (full binary
    /// emission is the lowerer's job; this subcommand drives it and
    /// reports the resulting instruction/diagnostic counts).
    Assemble {
        input: PathBuf,
        #[arg(long)]
        version: u32,
        #[arg(long)]
        map: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "utf8")]
        encoding: Encoding,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Encoding {
    Utf8,
    Cp932,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt().with_env_filter(level).try_init();
}

fn read_text(path: &PathBuf, encoding: Encoding) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    match encoding {
        Encoding::Utf8 => Ok(String::from_utf8(bytes)?),
        Encoding::Cp932 => Ok(dmtk::text_encoding::decode(&bytes, true)?),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Disassemble {
            input,
            version,
            map,
            output,
            encoding: _,
        } => {
            let overrides = map
                .map(|path| -> anyhow::Result<_> {
                    let text = std::fs::read_to_string(path)?;
                    let eclmap = script::eclmap::parse(&text)?;
                    Ok(eclmap.to_format_overrides())
                })
                .transpose()?;

            let data = std::fs::read(&input)?;
            let io = Io::from_fixed_buffer(data);
            let mut diagnostics = Vec::new();
            let text = script::disassemble(io, version, overrides.as_ref(), &mut diagnostics)?;
            for diag in &diagnostics {
                tracing::warn!(%diag, "disassembly warning");
            }
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => print!("{text}"),
            }
        }
        Command::Assemble { input, version, map, encoding } => {
            let eclmap = map
                .map(|path| -> anyhow::Result<_> {
                    let text = std::fs::read_to_string(path)?;
                    Ok(script::eclmap::parse(&text)?)
                })
                .transpose()?;

            let source = read_text(&input, encoding)?;
            let mut diagnostics = Vec::new();
            let module = script::assemble(&source, version, eclmap.as_ref(), &mut diagnostics)?;
            for diag in &diagnostics {
                tracing::warn!(%diag, "assembly warning");
            }
            let instr_count: usize = module.subs.iter().map(|s| s.instructions().count()).sum();
            println!(
                "assembled {} sub(s), {} instruction(s), {} diagnostic(s)",
                module.subs.len(),
                instr_count,
                diagnostics.len()
            );
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        tracing::error!(%err, "dmtk-ecl failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
