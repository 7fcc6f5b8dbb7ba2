//! hffs command line entry point

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use hffs::config::Config;
use hffs::filesystem::{FileInfo, FileSystem};
use hffs::hf::{CommitOptions, HfFileSystem};
use hffs::path::{self, RepoType};

#[derive(Parser)]
#[command(version, about = "Filesystem commands over Hugging Face Hub repositories")]
struct Cli {
    /// Configuration file (defaults to $HFFS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hub endpoint (defaults to $HF_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Access token
    #[arg(long, global = true)]
    token: Option<String>,

    /// Revision for paths that do not name one
    #[arg(long, global = true)]
    revision: Option<String>,

    /// Repo type of `<repo_id>:/<path>` paths without a type prefix
    #[arg(long, global = true)]
    repo_type: Option<RepoType>,

    /// Commit message for commands that change a repository
    #[arg(short, long, global = true)]
    message: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        path: String,
        /// Show size and type
        #[arg(short, long)]
        long: bool,
        /// List everything below the directory
        #[arg(short = 'R', long)]
        recursive: bool,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Show metadata of a path
    Info { path: String },
    /// Disk usage
    Du {
        path: String,
        /// Print the total only
        #[arg(short = 's', long)]
        summarize: bool,
        #[arg(long)]
        maxdepth: Option<usize>,
    },
    /// Expand a glob pattern
    Glob { pattern: String },
    /// Download a file
    Get { rpath: String, lpath: PathBuf },
    /// Upload a file
    Put { lpath: PathBuf, rpath: String },
    /// Copy within or across repositories
    Cp {
        src: String,
        dst: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move within or across repositories
    Mv {
        src: String,
        dst: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete files
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        maxdepth: Option<usize>,
    },
    /// Last modification time of a file
    Modified { path: String },
}

fn print_info(out: &mut impl Write, info: &FileInfo, long: bool) -> std::io::Result<()> {
    if !long {
        return writeln!(out, "{}", path::unstrip_protocol(&info.name));
    }
    let kind = if info.is_dir() { "directory" } else { "file" };
    writeln!(
        out,
        "{:>12}  {:<9}  {}",
        info.size,
        kind,
        path::unstrip_protocol(&info.name)
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(endpoint) = cli.endpoint {
        config.hub.endpoint = endpoint.trim_end_matches('/').to_string();
    }
    if cli.token.is_some() {
        config.hub.token = cli.token;
    }
    if cli.revision.is_some() {
        config.hub.revision = cli.revision;
    }
    if let Some(repo_type) = cli.repo_type {
        config.hub.repo_type = repo_type;
    }
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Using endpoint {}", config.hub.endpoint);

    let fs = HfFileSystem::from_config(&config)?;
    let fs = match cli.message {
        Some(message) => fs.with_commit_options(CommitOptions {
            message: Some(message),
            description: None,
        }),
        None => fs,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Ls {
            path,
            long,
            recursive,
        } => {
            let entries = if recursive {
                let mut entries = fs.find(&path, None, true).await?;
                let root = fs.strip_protocol(&path);
                entries.retain(|e| e.name != root);
                entries
            } else {
                fs.ls(&path, false).await?
            };
            for entry in &entries {
                print_info(&mut out, entry, long)?;
            }
        }
        Command::Cat { path } => {
            let mut reader = fs.open_read(&path).await?;
            loop {
                let chunk = reader.read(fs.options().block_size).await?;
                if chunk.is_empty() {
                    break;
                }
                out.write_all(&chunk)?;
            }
        }
        Command::Info { path } => {
            let info = fs.info(&path).await?;
            writeln!(out, "name: {}", path::unstrip_protocol(&info.name))?;
            writeln!(
                out,
                "type: {}",
                if info.is_dir() { "directory" } else { "file" }
            )?;
            writeln!(out, "size: {}", info.size)?;
            if let Some(blob_id) = &info.blob_id {
                writeln!(out, "blob_id: {}", blob_id)?;
            }
            if let Some(lfs) = &info.lfs {
                writeln!(out, "lfs: sha256:{} ({} bytes)", lfs.oid, lfs.size)?;
            }
            if let Some(date) = info.last_modified {
                writeln!(out, "last_modified: {}", date.to_rfc3339())?;
            }
        }
        Command::Du {
            path,
            summarize,
            maxdepth,
        } => {
            if summarize {
                writeln!(out, "{}", fs.du(&path, maxdepth).await?)?;
            } else {
                for (name, size) in fs.du_detail(&path, maxdepth).await? {
                    writeln!(out, "{:>12}  {}", size, path::unstrip_protocol(&name))?;
                }
            }
        }
        Command::Glob { pattern } => {
            for name in fs.glob(&pattern).await? {
                writeln!(out, "{}", path::unstrip_protocol(&name))?;
            }
        }
        Command::Get { rpath, lpath } => fs.get_file(&rpath, &lpath).await?,
        Command::Put { lpath, rpath } => fs.put_file(&lpath, &rpath).await?,
        Command::Cp {
            src,
            dst,
            recursive,
        } => fs.copy(&src, &dst, recursive).await?,
        Command::Mv {
            src,
            dst,
            recursive,
        } => fs.mv(&src, &dst, recursive).await?,
        Command::Rm {
            path,
            recursive,
            maxdepth,
        } => fs.rm(&path, recursive, maxdepth).await?,
        Command::Modified { path } => {
            writeln!(out, "{}", fs.modified(&path).await?.to_rfc3339())?;
        }
    }

    out.flush()?;
    Ok(())
}
