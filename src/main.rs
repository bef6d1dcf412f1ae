use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_patchwork::workflow::{self, Outcome};
use git_patchwork::{EnvironmentError, GitDiffSource, PatchworkError, TerminalPrompter, signal};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "git-patchwork", version)]
#[command(about = "Interactive multi-file git patch curation tool")]
struct Cli {
    /// Run as if started in PATH
    #[arg(short = 'C', global = true, value_name = "PATH", default_value = ".")]
    directory: PathBuf,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick changed files and write them to a new patch
    Create {
        /// Patch file to write (prompted for when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add, remove or refresh the files of an existing patch
    Update {
        /// Patch file to edit
        patch: PathBuf,
        /// Write the result here instead of replacing PATCH
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write each file of a patch to its own patch file
    Split {
        /// Patch file to split
        patch: PathBuf,
        /// Output directory (default: <stem>-split beside PATCH)
        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,
    },
    /// Print shell completions
    Completions { shell: Shell },
    /// Print the man page
    Man,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Requirements shared by the interactive commands
fn interactive() -> Result<(GitDiffSource, TerminalPrompter), PatchworkError> {
    if !std::io::stdin().is_terminal() {
        return Err(EnvironmentError::NoTerminal.into());
    }
    signal::install()?;
    let source = GitDiffSource::discover(".")?;
    Ok((source, TerminalPrompter::new()?))
}

fn run(cli: Cli) -> Result<(), PatchworkError> {
    // As with git, every relative path (arguments and prompted names alike)
    // is taken relative to -C
    std::env::set_current_dir(&cli.directory).map_err(|e| EnvironmentError::BadDirectory {
        path: cli.directory.display().to_string(),
        message: e.to_string(),
    })?;

    match &cli.command {
        Commands::Create { output } => {
            let (source, mut prompter) = interactive()?;
            report(workflow::create(&source, &mut prompter, output.as_deref())?);
        }
        Commands::Update { patch, output } => {
            let (source, mut prompter) = interactive()?;
            report(workflow::update(
                &source,
                &mut prompter,
                patch,
                output.as_deref(),
            )?);
        }
        Commands::Split { patch, output_dir } => {
            let split = workflow::split_file(patch, output_dir.as_deref())?;
            for collision in &split.collisions {
                eprintln!(
                    "note: {} renamed to {} (name taken)",
                    collision.path,
                    collision.written_to.display()
                );
            }
            println!("Wrote {} file(s)", split.count());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "git-patchwork",
                &mut std::io::stdout(),
            );
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command())
                .render(&mut std::io::stdout())
                .map_err(|e| PatchworkError::WriteError(git_patchwork::WriteError::Write {
                    path: "<stdout>".to_string(),
                    message: e.to_string(),
                }))?;
        }
    }
    Ok(())
}

fn report(outcome: Outcome) {
    match outcome {
        Outcome::Written { .. } => println!("{outcome}"),
        Outcome::Cancelled | Outcome::NothingSelected | Outcome::NoChanges => {
            eprintln!("{outcome}")
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
