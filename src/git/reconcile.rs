//! Nettoyage du working directory après la publication d'un stash.
//!
//! Deux étapes indépendantes, exécutées dans cet ordre : suppression des
//! fichiers non suivis capturés, puis remise à zéro des fichiers suivis.
//! Un échec est signalé mais ne dépublie jamais le stash.

use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{Repository, ResetType};

use super::snapshot::Snapshot;
use crate::error::{Result, StashError};

/// Ce qui est conservé après la capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepMode {
    /// Rien : index et working directory reviennent au commit de base.
    #[default]
    None,
    /// L'index est conservé tel quel ; les fichiers suivis capturés sont
    /// remis sur disque depuis le commit de base (stash de l'index seul).
    Worktree,
    /// `--keep-index` : l'index est conservé et tout le working directory
    /// est aligné sur lui.
    Index,
}

/// Aligne le working directory sur le snapshot qui vient d'être publié.
pub fn reconcile(repo: &Repository, snapshot: &Snapshot, keep: KeepMode) -> Result<()> {
    remove_untracked(repo, &snapshot.untracked_paths).map_err(|e| StashError::Cleanup {
        step: "untracked",
        details: e.to_string(),
    })?;

    reset_tracked(repo, snapshot, keep).map_err(|e| StashError::Cleanup {
        step: "reset",
        details: e.to_string(),
    })?;

    tracing::debug!(?keep, snapshot = %snapshot.id, "working directory nettoyé");
    Ok(())
}

/// Supprime les fichiers non suivis capturés, puis les répertoires devenus vides.
fn remove_untracked(repo: &Repository, paths: &[String]) -> Result<()> {
    let workdir = workdir(repo)?;

    for path in paths {
        let full_path = workdir.join(path);
        match fs::remove_file(&full_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StashError::io(format!("suppression de '{}'", path), e)),
        }
        prune_empty_parents(workdir, &full_path);
    }

    Ok(())
}

fn prune_empty_parents(workdir: &Path, file: &Path) {
    let mut current = file.parent();
    while let Some(dir) = current {
        if dir == workdir || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn reset_tracked(repo: &Repository, snapshot: &Snapshot, keep: KeepMode) -> Result<()> {
    match keep {
        KeepMode::None => {
            let base = repo.find_commit(snapshot.base)?;
            repo.reset(base.as_object(), ResetType::Hard, None)?;
        }
        KeepMode::Worktree => {
            if snapshot.tracked_paths.is_empty() {
                return Ok(());
            }
            let base_tree = repo.find_commit(snapshot.base)?.tree()?;
            let mut checkout = CheckoutBuilder::new();
            checkout.force().update_index(false);
            for path in &snapshot.tracked_paths {
                checkout.path(path.as_str());
            }
            repo.checkout_tree(base_tree.as_object(), Some(&mut checkout))?;
        }
        KeepMode::Index => {
            let mut checkout = CheckoutBuilder::new();
            checkout
                .force()
                .remove_untracked(false)
                .update_index(false);
            repo.checkout_index(None, Some(&mut checkout))?;
        }
    }
    Ok(())
}

fn workdir(repo: &Repository) -> Result<&Path> {
    repo.workdir()
        .ok_or_else(|| StashError::InvalidState("repository sans working directory".into()))
}
