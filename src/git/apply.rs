//! Restauration d'un stash dans l'index et le working directory.
//!
//! `apply` tente d'abord de restaurer l'index capturé. Si la fusion de
//! l'index entre en conflit, seule la restauration du working directory est
//! faite. Le résultat indique lequel des deux a eu lieu, et `pop` ne
//! supprime l'entrée que dans le premier cas.

use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    Commit, Index, ObjectType, Oid, Repository, Status, Tree, TreeWalkMode, TreeWalkResult,
};

use super::branch;
use super::store::{StashEntry, StashStore};
use crate::error::{Result, StashError};

/// Résultat d'une application réussie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Index et working directory restaurés.
    RestoredWithIndex,
    /// L'index capturé n'a pas pu être restauré : seul le working directory l'a été.
    RestoredWorktreeOnly,
}

/// Résultat d'une suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Snapshots retirés de la pile, dans l'ordre de suppression.
    Dropped(Vec<Oid>),
    /// La suppression multiple n'a pas été confirmée.
    Cancelled,
}

/// Fichier de la couche « non suivis » à réécrire sur disque.
struct UntrackedFile {
    path: String,
    id: Oid,
    mode: i32,
}

/// Applique, pop, supprime et transforme en branche les entrées d'une pile.
pub struct StashApplier<'r> {
    repo: &'r Repository,
    store: &'r StashStore,
}

impl<'r> StashApplier<'r> {
    pub fn new(repo: &'r Repository, store: &'r StashStore) -> Self {
        Self { repo, store }
    }

    /// Applique le snapshot donné sans toucher à la pile.
    pub fn apply(&self, snapshot: Oid) -> Result<ApplyOutcome> {
        let commit = self.repo.find_commit(snapshot)?;

        match self.restore(&commit, true) {
            Ok(()) => {
                tracing::info!(%snapshot, "stash appliqué avec son index");
                Ok(ApplyOutcome::RestoredWithIndex)
            }
            Err(StashError::ApplyConflict { paths }) => {
                tracing::warn!(%snapshot, ?paths, "conflit sur l'index, application sans l'index");
                self.restore(&commit, false)?;
                Ok(ApplyOutcome::RestoredWorktreeOnly)
            }
            Err(e) => Err(e),
        }
    }

    /// Applique l'entrée `index` de la pile.
    pub fn apply_entry(&self, index: usize) -> Result<ApplyOutcome> {
        let snapshot = self.store.resolve(self.repo, index)?;
        self.apply(snapshot)
    }

    /// Applique puis supprime l'entrée, sauf si l'index n'a pas pu être restauré.
    pub fn pop(&self, index: usize) -> Result<ApplyOutcome> {
        let snapshot = self.store.resolve(self.repo, index)?;
        let outcome = self.apply(snapshot)?;
        self.drop_if_restored(index, snapshot, outcome)?;
        Ok(outcome)
    }

    /// Supprime les entrées sélectionnées.
    ///
    /// Une sélection de plusieurs entrées n'est supprimée que si `confirm`
    /// retourne true. Les suppressions se font de la plus ancienne à la plus
    /// récente pour ne pas décaler les positions restant à traiter.
    pub fn drop<F>(&self, selection: &[usize], confirm: F) -> Result<DropOutcome>
    where
        F: FnOnce(&[StashEntry]) -> bool,
    {
        let entries = self.store.entries(self.repo)?;
        let mut indices = selection.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        let mut selected = Vec::with_capacity(indices.len());
        for &index in indices.iter().rev() {
            let entry = entries.get(index).ok_or(StashError::StashNotFound {
                index,
                len: entries.len(),
            })?;
            selected.push(entry.clone());
        }

        if selected.len() > 1 && !confirm(&selected) {
            tracing::debug!(count = selected.len(), "suppression multiple annulée");
            return Ok(DropOutcome::Cancelled);
        }

        let mut dropped = Vec::with_capacity(indices.len());
        for index in indices {
            dropped.push(self.store.drop(self.repo, index)?);
        }
        Ok(DropOutcome::Dropped(dropped))
    }

    /// Crée la branche `name` sur le commit de base du stash, la checkout,
    /// puis y applique le stash.
    pub fn branch(&self, index: usize, name: &str) -> Result<ApplyOutcome> {
        let snapshot = self.store.resolve(self.repo, index)?;
        let commit = self.repo.find_commit(snapshot)?;
        let base = commit.parent(0)?;

        branch::create_branch_at(self.repo, name, &base)?;
        branch::checkout_branch(self.repo, name)?;
        tracing::info!(branch = name, base = %base.id(), "branche créée depuis le stash");

        let outcome = self.apply(snapshot)?;
        self.drop_if_restored(index, snapshot, outcome)?;
        Ok(outcome)
    }

    fn drop_if_restored(&self, index: usize, snapshot: Oid, outcome: ApplyOutcome) -> Result<()> {
        if outcome == ApplyOutcome::RestoredWorktreeOnly {
            tracing::info!(index, "entrée conservée : l'index n'a pas été restauré");
            return Ok(());
        }

        if self.store.resolve(self.repo, index)? != snapshot {
            return Err(StashError::ConcurrentUpdate {
                reference: self.store.reference().to_string(),
            });
        }
        self.store.drop(self.repo, index)?;
        Ok(())
    }

    /// Restaure le snapshot. Rien n'est écrit tant que les fusions n'ont pas
    /// réussi.
    fn restore(&self, snapshot: &Commit<'_>, reinstate_index: bool) -> Result<()> {
        if snapshot.parent_count() < 2 {
            return Err(StashError::InvalidState(format!(
                "{} n'est pas un commit de stash",
                snapshot.id()
            )));
        }
        let base_tree = snapshot.parent(0)?.tree()?;
        let index_tree = snapshot.parent(1)?.tree()?;
        let stash_tree = snapshot.tree()?;
        let untracked_tree = if snapshot.parent_count() > 2 {
            Some(snapshot.parent(2)?.tree()?)
        } else {
            None
        };

        let mut repo_index = self.repo.index()?;
        if repo_index.has_conflicts() {
            return Err(StashError::InvalidState(
                "l'index contient des conflits non résolus".into(),
            ));
        }
        let current_tree = self.repo.find_tree(repo_index.write_tree()?)?;

        let reinstated = reinstate_index && index_tree.id() != base_tree.id();
        let new_index_tree = if reinstated {
            let mut merged = self
                .repo
                .merge_trees(&base_tree, &current_tree, &index_tree, None)?;
            ensure_no_conflicts(&merged)?;
            self.repo.find_tree(merged.write_tree_to(self.repo)?)?
        } else {
            current_tree.clone()
        };

        // Fusion depuis l'index courant, pas depuis l'index restauré.
        let mut worktree = self
            .repo
            .merge_trees(&base_tree, &current_tree, &stash_tree, None)?;
        ensure_no_conflicts(&worktree)?;

        // Seuls les fichiers modifiés par la fusion sont écrits sur disque.
        let merged_tree = self.repo.find_tree(worktree.write_tree_to(self.repo)?)?;
        let changed = changed_paths(self.repo, &current_tree, &merged_tree)?;
        ensure_clean(self.repo, &changed)?;

        let untracked = match &untracked_tree {
            Some(tree) => untracked_files(tree)?,
            None => Vec::new(),
        };
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| StashError::InvalidState("repository sans working directory".into()))?;
        if let Some(existing) = untracked.iter().find(|f| workdir.join(&f.path).exists()) {
            return Err(StashError::UntrackedExists {
                path: existing.path.clone(),
            });
        }

        if !changed.is_empty() {
            let mut checkout = CheckoutBuilder::new();
            checkout.force().update_index(false);
            for path in &changed {
                checkout.path(path.as_str());
            }
            self.repo
                .checkout_index(Some(&mut worktree), Some(&mut checkout))?;
        }

        write_untracked(self.repo, workdir, &untracked)?;

        repo_index.read_tree(&new_index_tree)?;
        if !reinstated {
            for entry in worktree.iter() {
                let path = String::from_utf8_lossy(&entry.path).into_owned();
                if is_new_file(&path, &base_tree, &new_index_tree) {
                    repo_index.add(&entry)?;
                }
            }
        }
        repo_index.write()?;

        Ok(())
    }
}

fn is_new_file(path: &str, base: &Tree<'_>, index: &Tree<'_>) -> bool {
    base.get_path(Path::new(path)).is_err() && index.get_path(Path::new(path)).is_err()
}

/// Chemins qui diffèrent entre deux arbres.
fn changed_paths(repo: &Repository, from: &Tree<'_>, to: &Tree<'_>) -> Result<Vec<String>> {
    let diff = repo.diff_tree_to_tree(Some(from), Some(to), None)?;
    let mut paths: Vec<String> = diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|path| path.to_string_lossy().into_owned())
        })
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Refuse d'écraser des modifications locales non indexées.
fn ensure_clean(repo: &Repository, paths: &[String]) -> Result<()> {
    let dirty: Vec<&str> = paths
        .iter()
        .filter(|path| match repo.status_file(Path::new(path.as_str())) {
            Ok(status) => status.intersects(
                Status::WT_NEW
                    | Status::WT_MODIFIED
                    | Status::WT_DELETED
                    | Status::WT_TYPECHANGE
                    | Status::WT_RENAMED,
            ),
            Err(_) => false,
        })
        .map(String::as_str)
        .collect();

    if dirty.is_empty() {
        return Ok(());
    }
    tracing::warn!(paths = ?dirty, "modifications locales en conflit avec le stash");
    Err(StashError::InvalidState(format!(
        "des modifications locales seraient écrasées : {}",
        dirty.join(", ")
    )))
}

fn ensure_no_conflicts(index: &Index) -> Result<()> {
    if !index.has_conflicts() {
        return Ok(());
    }

    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Err(StashError::ApplyConflict { paths })
}

fn untracked_files(tree: &Tree<'_>) -> Result<Vec<UntrackedFile>> {
    let mut files = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                files.push(UntrackedFile {
                    path: format!("{}{}", root, name),
                    id: entry.id(),
                    mode: entry.filemode(),
                });
            }
        }
        TreeWalkResult::Ok
    })?;
    Ok(files)
}

fn write_untracked(repo: &Repository, workdir: &Path, files: &[UntrackedFile]) -> Result<()> {
    for file in files {
        let full_path = workdir.join(&file.path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StashError::io(format!("création de '{}'", parent.display()), e))?;
        }
        let blob = repo.find_blob(file.id)?;
        write_blob(&full_path, blob.content(), file.mode)
            .map_err(|e| StashError::io(format!("restauration de '{}'", file.path), e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn write_blob(path: &Path, content: &[u8], mode: i32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        0o120000 => {
            let target = String::from_utf8_lossy(content).into_owned();
            std::os::unix::fs::symlink(target, path)
        }
        0o100755 => {
            fs::write(path, content)?;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        }
        _ => fs::write(path, content),
    }
}

#[cfg(not(unix))]
fn write_blob(path: &Path, content: &[u8], _mode: i32) -> std::io::Result<()> {
    fs::write(path, content)
}
