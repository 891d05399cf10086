//! transcriptctl CLI - export chat transcripts captured from a rendered page
//!
//! The page is read from a JSON snapshot; the export pipeline drives it the
//! way it would drive the live chat page (hover, edit, copy) and saves the
//! resulting markdown document into a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use transcriptctl_core::{DiskSaver, ExportConfig, Exporter, Host, SnapshotPage};

mod listen;
mod tracing_setup;
mod ui;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "transcriptctl",
    author,
    version,
    about = "Export a chat conversation (messages, artifacts, attachments) to markdown",
    long_about = "Drive a chat page's own edit and copy controls to recover raw messages and \
                  responses, collect artifacts and uploaded files, and save everything as one \
                  markdown document with a context appendix."
)]
struct Cli {
    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.transcriptctl/config.toml)
    #[arg(long, global = true, value_name = "PATH", env = "TRANSCRIPTCTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one export against a page snapshot
    Export(ExportArgs),
    /// Read control messages from stdin and run exports on request
    Listen(listen::ListenArgs),
    /// Print the effective selector registry
    Selectors,
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Page snapshot (JSON)
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Output directory (default: config output_dir or ~/.transcriptctl/exports)
    #[arg(long = "out", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Skip the pause that keeps the final status visible
    #[arg(long = "no-linger")]
    no_linger: bool,
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    // Initialize UI quiet mode from flag, env var, and TTY detection
    ui::init_quiet_mode(cli.quiet);

    match cli.command {
        Commands::Export(args) => run_export(args, load_config(&cli.config)?).await?,
        Commands::Listen(args) => listen::run_listen(args, load_config(&cli.config)?).await?,
        Commands::Selectors => run_selectors(load_config(&cli.config)?)?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<ExportConfig> {
    ExportConfig::load(path.as_deref()).context("failed to load configuration")
}

async fn run_export(args: ExportArgs, mut config: ExportConfig) -> Result<()> {
    if args.no_linger {
        config.delays.linger_ms = 0;
    }
    let output_dir = args.output.unwrap_or_else(|| config.output_dir());
    let page = SnapshotPage::from_path(&args.input)?;
    let exporter = Exporter::new(config)?;
    let saver = DiskSaver::new(&output_dir);
    let overlay = ui::SpinnerOverlay::new();

    info!("exporting {:?} -> {:?}", args.input, output_dir);

    let host = Host {
        page: &page,
        storage: &page,
        clipboard: &page,
        overlay: &overlay,
    };
    let report = exporter
        .start(host, &saver)
        .await
        .context("export failed")?;

    println!("{}", report.progress.summary_line(&report.filename));
    Ok(())
}

fn run_selectors(config: ExportConfig) -> Result<()> {
    let registry = config.selector_registry()?;
    for (name, selector) in registry.entries() {
        println!("{:<22} {}", name, selector);
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
