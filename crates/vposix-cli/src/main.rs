//! # vposix CLI
//!
//! Inspect what the POSIX facade sees on this machine: file metadata,
//! user-database entries, link targets, struct layouts and the strategy
//! bound to each operation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use vposix::{FileStat, Passwd, Posix, Timestamp};
use vposix_config::logging::{init_logging, Component, LogLevel};
use vposix_config::{Config, StrategyMode};
use vposix_layout::{AddrWidth, OsFamily, Platform};

/// POSIX compatibility layer inspector
#[derive(Parser)]
#[command(name = "vposix")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the configured strategy (auto, native, fallback)
    #[arg(long, global = true, value_name = "MODE")]
    strategy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Facade(FacadeCommands),

    /// Print native struct layouts for a platform
    Layout {
        /// OS family (default: host)
        #[arg(long)]
        os: Option<String>,

        /// Address width in bits (default: host)
        #[arg(long)]
        width: Option<u32>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Subcommands answered through a [`Posix`] facade
#[derive(Subcommand)]
enum FacadeCommands {
    /// Show file metadata
    Stat {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Describe a symlink itself instead of its target
        #[arg(short = 'L', long)]
        no_follow: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up user-database entries
    Passwd {
        /// Login name to look up
        #[arg(value_name = "NAME", conflicts_with_all = ["uid", "all"])]
        name: Option<String>,

        /// Look up by numeric uid
        #[arg(long, conflicts_with = "all")]
        uid: Option<u32>,

        /// Enumerate every entry
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print the target of a symbolic link
    Readlink {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show the strategy bound to each operation
    Dispatch,

    /// Current identity
    Whoami,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration as TOML
    Show,
    /// Show config file locations
    Path,
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(component = Component::CLI, "Ignoring unreadable config: {}", e);
        Config::default()
    });
    if let Some(mode) = &cli.strategy {
        config.strategy.mode = mode
            .parse::<StrategyMode>()
            .with_context(|| format!("Invalid --strategy {}", mode))?;
    }

    match cli.command {
        Commands::Config { command } => cmd_config(&config, command),
        Commands::Layout { os, width } => cmd_layout(os.as_deref(), width),
        Commands::Facade(command) => {
            let posix = Posix::builder().config(config).build();
            run(&posix, command)
        }
    }
}

fn run(posix: &Posix, command: FacadeCommands) -> Result<()> {
    match command {
        FacadeCommands::Stat {
            path,
            no_follow,
            json,
        } => {
            let st = if no_follow {
                posix.lstat(&path)
            } else {
                posix.stat(&path)
            }
            .with_context(|| format!("cannot stat {}", path.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&st)?);
            } else {
                print_stat(&path, &st);
            }
        }

        FacadeCommands::Passwd {
            name,
            uid,
            all,
            json,
        } => {
            let entries = if all {
                let mut cursor = posix.setpwent().context("cannot enumerate users")?;
                let entries: Vec<Passwd> = std::iter::from_fn(|| posix.getpwent(&mut cursor)).collect();
                posix.endpwent(&mut cursor);
                entries
            } else if let Some(uid) = uid {
                lookup(posix.getpwuid(uid), &uid.to_string())?
            } else {
                let name = match name {
                    Some(name) => name,
                    None => posix
                        .getlogin()
                        .context("cannot determine login name")?
                        .context("no login name; pass NAME or --uid")?,
                };
                lookup(posix.getpwnam(&name), &name)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!(
                        "{}:{}:{}:{}:{}:{}",
                        entry.name,
                        entry.uid,
                        entry.gid,
                        entry.gecos.as_deref().unwrap_or(""),
                        entry.dir.display(),
                        entry.shell.display()
                    );
                }
            }
        }

        FacadeCommands::Readlink { path } => {
            let target = posix
                .readlink(&path)
                .with_context(|| format!("cannot read link {}", path.display()))?;
            println!("{}", target.display());
        }

        FacadeCommands::Dispatch => {
            println!("platform: {}", posix.platform());
            for (op, strategy) in posix.table().entries() {
                println!("  {:<10} {}", op.name(), strategy.unwrap_or("unimplemented"));
            }
        }

        FacadeCommands::Whoami => {
            let login = posix.getlogin().ok().flatten();
            println!("login: {}", login.as_deref().unwrap_or("?"));
            println!("pid:   {}", posix.getpid());
            println!(
                "uid:   {} (effective {})",
                show_id(posix.getuid()),
                show_id(posix.geteuid())
            );
            println!(
                "gid:   {} (effective {})",
                show_id(posix.getgid()),
                show_id(posix.getegid())
            );
        }
    }
    Ok(())
}

fn lookup(result: Result<Option<Passwd>, vposix::ErrorKind>, key: &str) -> Result<Vec<Passwd>> {
    match result.with_context(|| format!("lookup of {} failed", key))? {
        Some(entry) => Ok(vec![entry]),
        None => bail!("no such user: {}", key),
    }
}

fn show_id(id: Result<u32, vposix::ErrorKind>) -> String {
    match id {
        Ok(id) => id.to_string(),
        Err(kind) => format!("<{}>", kind),
    }
}

fn show_time(ts: &Timestamp) -> String {
    format!("{}.{:09}", ts.sec, ts.nsec)
}

fn print_stat(path: &std::path::Path, st: &FileStat) {
    println!("  File: {}", path.display());
    println!(
        "  Size: {:<12} Blocks: {:<8} IO Block: {:<6} {}",
        st.size,
        st.blocks,
        st.blksize,
        st.ftype()
    );
    println!("Device: {:<12} Inode: {:<10} Links: {}", st.dev, st.ino, st.nlink);
    if st.is_char_device() || st.is_block_device() {
        println!("  Type: {}, {}", st.major(), st.minor());
    }
    println!(
        "Access: ({:04o})  Uid: {:<6} Gid: {}",
        st.permissions(),
        st.uid,
        st.gid
    );
    println!("Access: {}", show_time(&st.atime));
    println!("Modify: {}", show_time(&st.mtime));
    println!("Change: {}", show_time(&st.ctime));
    if let Some(birth) = &st.birthtime {
        println!(" Birth: {}", show_time(birth));
    }
}

fn cmd_layout(os: Option<&str>, width: Option<u32>) -> Result<()> {
    let host = Platform::current();
    let os: OsFamily = match os {
        Some(os) => os.parse()?,
        None => host.os,
    };
    let width = match width {
        Some(bits) => AddrWidth::from_bits(bits)?,
        None => host.width,
    };
    let platform = Platform::new(os, width);

    println!("platform: {}", platform);
    let tables = [
        ("stat", vposix_layout::stat::layout_for(platform)),
        ("passwd", vposix_layout::passwd::layout_for(platform)),
        ("utimbuf", vposix_layout::utimbuf::layout_for(platform)),
    ];
    for (name, layout) in tables {
        println!();
        match layout {
            Some(layout) => print!("{}", layout),
            None => println!("{}: no native layout (fallback strategy)", name),
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigCommands::Path => {
            match Config::global_config_path() {
                Some(path) => println!("Global: {}", path.display()),
                None => println!("Global: (no home directory)"),
            }
            println!("Project: {}", Config::project_config_path().display());
        }
    }
    Ok(())
}
