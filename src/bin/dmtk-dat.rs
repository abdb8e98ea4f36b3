//! Archive CLI (EXPANSION → "CLI surface"), a thin `clap`-derive wrapper
//! over [`dmtk::archive`]. Mirrors `datpacker.c`'s dispatch-by-version
//! `main`, but argument parsing lives here, never in the library.

use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dmtk::archive::{detect, Archive};
use dmtk::io::Io;

#[derive(Parser)]
#[command(name = "dmtk-dat", about = "Inspect and repack danmaku archive containers")]
struct Cli {
    /// Increase log verbosity; repeat for more detail.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every entry in an archive.
    List {
        archive: PathBuf,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Extract a single entry to stdout or a destination file.
    Extract {
        archive: PathBuf,
        entry: String,
        #[arg(long)]
        version: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract every entry into a destination directory.
    ExtractAll {
        archive: PathBuf,
        #[arg(long)]
        version: Option<u32>,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Create a new archive from a list of files.
    Create {
        archive: PathBuf,
        #[arg(long)]
        version: u32,
        files: Vec<PathBuf>,
    },
    /// Sniff an archive's container version from its header bytes.
    Detect { archive: PathBuf },
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

fn open_io(path: &PathBuf) -> anyhow::Result<Io> {
    Ok(Io::from_file(File::open(path)?))
}

fn resolve_version(path: &PathBuf, version: Option<u32>) -> anyhow::Result<u32> {
    if let Some(v) = version {
        return Ok(v);
    }
    let mut file = File::open(path)?;
    use std::io::Read;
    let mut prefix = vec![0u8; 32];
    let n = file.read(&mut prefix)?;
    prefix.truncate(n);
    let filename = path.to_string_lossy();
    match detect::detect(&filename, &prefix) {
        detect::Detection::Resolved(v) => Ok(v),
        detect::Detection::Ambiguous(_) => Err(anyhow::anyhow!("could not detect archive version; pass --version")),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::List { archive, version } => {
            let version = resolve_version(&archive, version)?;
            let io = open_io(&archive)?;
            let handle = Archive::open(version, io)?;
            for entry in handle.entries() {
                println!("{}\t{}\t{}", entry.name, entry.size, entry.zsize);
            }
        }
        Command::Extract {
            archive,
            entry,
            version,
            output,
        } => {
            let version = resolve_version(&archive, version)?;
            let io = open_io(&archive)?;
            let mut handle = Archive::open(version, io)?;
            let idx = handle
                .entry_by_name(&entry)
                .ok_or_else(|| anyhow::anyhow!("no such entry: {entry}"))?;
            let data = handle.entry_read_data(idx)?;
            match output {
                Some(path) => std::fs::write(path, data)?,
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&data)?;
                }
            }
        }
        Command::ExtractAll { archive, version, output } => {
            let version = resolve_version(&archive, version)?;
            let io = open_io(&archive)?;
            let mut handle = Archive::open(version, io)?;
            std::fs::create_dir_all(&output)?;
            for idx in 0..handle.entry_count() {
                let name = handle.entry_get_name(idx).to_string();
                let data = handle.entry_read_data(idx)?;
                std::fs::write(output.join(&name), data)?;
            }
        }
        Command::Create { archive, version, files } => {
            let io = Io::new_growable();
            let mut handle = Archive::create(version, io, files.len())?;
            for path in &files {
                let data = std::fs::read(path)?;
                let name = path
                    .file_name()
                    .ok_or_else(|| anyhow::anyhow!("bad input path: {}", path.display()))?
                    .to_string_lossy()
                    .to_string();
                handle.entry_write_data(&name, &data)?;
            }
            let io = handle.close()?;
            std::fs::write(archive, io.into_buffer())?;
        }
        Command::Detect { archive } => {
            let mut file = File::open(&archive)?;
            use std::io::Read;
            let mut prefix = vec![0u8; 32];
            let n = file.read(&mut prefix)?;
            prefix.truncate(n);
            let filename = archive.to_string_lossy();
            match detect::detect(&filename, &prefix) {
                detect::Detection::Resolved(v) => println!("{v}"),
                detect::Detection::Ambiguous(_) => println!("unknown"),
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        tracing::error!(%err, "dmtk-dat failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
