use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stashkit::error_display::{format_apply_outcome, format_error_message, format_success_message};
use stashkit::{DropOutcome, GitRepo, KeepMode, PushRequest, SnapshotOptions, UntrackedMode};

#[derive(Parser)]
#[command(name = "stashkit")]
#[command(about = "Créez, appliquez et supprimez des stashes git")]
#[command(version)]
struct Cli {
    /// Chemin du repository (défaut : répertoire courant)
    #[arg(short, long, default_value = ".", global = true)]
    path: String,

    /// Logs détaillés sur stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sauvegarde les modifications locales dans un nouveau stash
    Push {
        /// Message du stash
        #[arg(short, long)]
        message: Option<String>,

        /// Conserver l'index après la sauvegarde
        #[arg(short, long)]
        keep_index: bool,

        /// Ne sauvegarder que les modifications non indexées
        #[arg(long, conflicts_with = "staged")]
        unstaged: bool,

        /// Ne sauvegarder que l'index (l'index est conservé)
        #[arg(long)]
        staged: bool,

        /// Inclure les fichiers non suivis
        #[arg(short = 'u', long)]
        include_untracked: bool,

        /// Inclure les fichiers non suivis et ignorés
        #[arg(short, long, conflicts_with = "include_untracked")]
        all: bool,

        /// Ne pas échouer s'il n'y a rien à sauvegarder
        #[arg(long)]
        allow_empty: bool,

        /// Ne pas nettoyer le working directory après la sauvegarde
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Liste les stashes
    List,
    /// Applique un stash sans le supprimer
    Apply {
        #[arg(default_value = "0")]
        index: usize,
    },
    /// Applique puis supprime un stash
    Pop {
        #[arg(default_value = "0")]
        index: usize,
    },
    /// Supprime un ou plusieurs stashes
    Drop {
        #[arg(default_values_t = [0usize])]
        indices: Vec<usize>,

        /// Confirmer la suppression de plusieurs stashes
        #[arg(short, long)]
        yes: bool,
    },
    /// Supprime tous les stashes
    Clear,
    /// Crée une branche depuis un stash et l'y applique
    Branch {
        name: String,
        #[arg(default_value = "0")]
        index: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo = GitRepo::open(&cli.path)?;

    if let Err(err) = run(&repo, cli.command) {
        eprintln!("{}", format_error_message(&err));
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(repo: &GitRepo, command: Commands) -> stashkit::Result<()> {
    match command {
        Commands::Push {
            message,
            keep_index,
            unstaged,
            staged,
            include_untracked,
            all,
            allow_empty,
            no_cleanup,
        } => {
            let untracked = if all {
                UntrackedMode::All
            } else if include_untracked || repo.config.include_untracked {
                UntrackedMode::Untracked
            } else {
                UntrackedMode::None
            };

            let keep = if staged {
                KeepMode::Worktree
            } else if unstaged || keep_index {
                KeepMode::Index
            } else {
                KeepMode::None
            };

            let request = PushRequest {
                message,
                options: SnapshotOptions {
                    include_staged: !unstaged,
                    include_worktree: !staged,
                    untracked,
                    allow_empty,
                },
                cleanup: (!no_cleanup).then_some(keep),
            };

            match repo.push(&request)? {
                Some(report) => {
                    if let Some(err) = &report.cleanup_error {
                        eprintln!("{}", format_error_message(err));
                    }
                    println!(
                        "{}",
                        format_success_message(&format!("Sauvegardé : {}", report.snapshot.message))
                    );
                }
                None => println!("Aucun changement local à sauvegarder"),
            }
        }
        Commands::List => print_list(repo)?,
        Commands::Apply { index } => {
            let outcome = repo.apply(index)?;
            println!("{}", format_apply_outcome(&format!("Apply stash@{{{}}}", index), outcome));
        }
        Commands::Pop { index } => {
            let outcome = repo.pop(index)?;
            println!("{}", format_apply_outcome(&format!("Pop stash@{{{}}}", index), outcome));
        }
        Commands::Drop { indices, yes } => match repo.drop(&indices, |_| yes)? {
            DropOutcome::Dropped(ids) => {
                println!(
                    "{}",
                    format_success_message(&format!("{} stash(es) supprimé(s)", ids.len()))
                );
            }
            DropOutcome::Cancelled => {
                println!("Suppression de plusieurs stashes : relancez avec --yes pour confirmer");
            }
        },
        Commands::Clear => {
            repo.clear()?;
            println!("{}", format_success_message("Stashes supprimés"));
        }
        Commands::Branch { name, index } => {
            let outcome = repo.branch(index, &name)?;
            let current = repo.current_branch()?;
            println!(
                "{}",
                format_apply_outcome(&format!("Branche '{}' créée", current), outcome)
            );
        }
    }

    Ok(())
}

/// Affiche les stashes en mode non-interactif.
fn print_list(repo: &GitRepo) -> stashkit::Result<()> {
    for entry in repo.stashes()? {
        let date = chrono::DateTime::from_timestamp(entry.timestamp, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "???".to_string());

        println!(
            "\x1b[33m{}\x1b[0m {} \x1b[90m— {}\x1b[0m",
            entry.name(),
            entry.message,
            date,
        );
    }

    Ok(())
}
