//! Construction des commits de stash.
//!
//! Un snapshot a la même forme qu'un stash git :
//!
//! ```text
//!   snapshot ── parent 0 : commit de base (HEAD)
//!            ├─ parent 1 : "index on <résumé>"   (arbre de l'index, parent = base)
//!            └─ parent 2 : "untracked files on <résumé>" (orphelin, optionnel)
//! ```
//!
//! Rien n'est publié ici : un échec laisse au pire des objets non référencés.

use git2::{Commit, Oid, Repository, Signature};

use super::ephemeral_index::EphemeralIndex;
use super::object_writer::ObjectWriter;
use super::status::{UntrackedMode, WorkingCopyState};
use crate::error::{ChangeScope, Result, SnapshotStage, StashError};

/// Ce qu'il faut capturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Capturer l'index tel quel dans le commit d'index.
    pub include_staged: bool,
    /// Capturer les modifications des fichiers suivis du working directory.
    pub include_worktree: bool,
    pub untracked: UntrackedMode,
    /// Sans changement à capturer, retourner `Ok(None)` au lieu d'une erreur.
    pub allow_empty: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_staged: true,
            include_worktree: true,
            untracked: UntrackedMode::None,
            allow_empty: false,
        }
    }
}

impl SnapshotOptions {
    /// Périmètre signalé quand il n'y a rien à capturer.
    pub fn scope(&self) -> ChangeScope {
        match (self.include_staged, self.include_worktree) {
            (true, false) => ChangeScope::Staged,
            (false, true) => ChangeScope::Unstaged,
            _ => ChangeScope::Local,
        }
    }
}

/// Snapshot écrit dans la base d'objets, pas encore publié.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Oid,
    pub base: Oid,
    pub index_commit: Oid,
    pub untracked_commit: Option<Oid>,
    pub message: String,
    /// Fichiers suivis capturés, depuis le working directory ou, pour un
    /// stash de l'index seul, depuis l'index.
    pub tracked_paths: Vec<String>,
    /// Fichiers non suivis capturés.
    pub untracked_paths: Vec<String>,
}

/// Construit les trois couches d'un snapshot.
pub struct SnapshotBuilder<'r> {
    repo: &'r Repository,
    writer: ObjectWriter<'r>,
}

impl<'r> SnapshotBuilder<'r> {
    pub fn new(repo: &'r Repository, signature: Signature<'static>) -> Self {
        Self {
            repo,
            writer: ObjectWriter::new(repo, signature),
        }
    }

    /// Construit un snapshot avec `message` comme message du commit final.
    ///
    /// Retourne `Ok(None)` si rien n'est à capturer et que `allow_empty` est
    /// activé.
    pub fn build(&self, message: &str, opts: &SnapshotOptions) -> Result<Option<Snapshot>> {
        let base = self.writer.base_commit()?;
        let state = WorkingCopyState::read(self.repo, opts.untracked)?;

        let has_staged = opts.include_staged && !state.staged.is_empty();
        let has_worktree = opts.include_worktree && !state.unstaged.is_empty();
        let has_untracked = opts.untracked.is_requested() && !state.untracked.is_empty();

        if !(has_staged || has_worktree || has_untracked) {
            if opts.allow_empty {
                tracing::debug!(scope = %opts.scope(), "rien à capturer");
                return Ok(None);
            }
            return Err(StashError::NoChanges(opts.scope()));
        }

        let summary = head_summary(self.repo, &base);

        let index_commit = self
            .write_index_commit(&base, &summary, opts.include_staged)
            .map_err(|e| e.at_stage(SnapshotStage::Index))?;
        tracing::debug!(%index_commit, "commit d'index écrit");

        let untracked_commit = if has_untracked {
            let oid = self
                .write_untracked_commit(&summary, &state.untracked)
                .map_err(|e| e.at_stage(SnapshotStage::Untracked))?;
            tracing::debug!(untracked_commit = %oid, files = state.untracked.len(), "commit des fichiers non suivis écrit");
            Some(oid)
        } else {
            None
        };

        let worktree_paths = if opts.include_worktree {
            state.tracked_changes()
        } else {
            Vec::new()
        };
        let tracked_paths = if opts.include_worktree || !opts.include_staged {
            worktree_paths.clone()
        } else {
            state.staged_changes()
        };

        let id = self
            .write_worktree_commit(message, &base, index_commit, untracked_commit, &worktree_paths)
            .map_err(|e| e.at_stage(SnapshotStage::Worktree))?;
        tracing::debug!(snapshot = %id, "snapshot écrit");

        Ok(Some(Snapshot {
            id,
            base: base.id(),
            index_commit,
            untracked_commit,
            message: message.to_string(),
            tracked_paths,
            untracked_paths: if has_untracked {
                state.untracked
            } else {
                Vec::new()
            },
        }))
    }

    fn write_index_commit(
        &self,
        base: &Commit<'_>,
        summary: &str,
        include_staged: bool,
    ) -> Result<Oid> {
        let tree = if include_staged {
            self.repo
                .index()?
                .write_tree()
                .map_err(StashError::TreeWrite)?
        } else {
            base.tree_id()
        };

        self.writer
            .commit(&format!("index on {}", summary), tree, &[base.id()])
    }

    fn write_untracked_commit(&self, summary: &str, paths: &[String]) -> Result<Oid> {
        let mut scratch = EphemeralIndex::acquire(self.repo, None)?;
        scratch.stage(paths)?;
        let tree = scratch.write_tree()?;

        self.writer
            .commit(&format!("untracked files on {}", summary), tree, &[])
    }

    fn write_worktree_commit(
        &self,
        message: &str,
        base: &Commit<'_>,
        index_commit: Oid,
        untracked_commit: Option<Oid>,
        tracked_paths: &[String],
    ) -> Result<Oid> {
        let seed = self.repo.find_commit(index_commit)?.tree()?;
        let mut scratch = EphemeralIndex::acquire(self.repo, Some(&seed))?;
        if !tracked_paths.is_empty() {
            scratch.stage(tracked_paths)?;
        }
        let tree = scratch.write_tree()?;

        let mut parents = vec![base.id(), index_commit];
        parents.extend(untracked_commit);
        self.writer.commit(message, tree, &parents)
    }
}

/// Résumé de HEAD au format `<branche>: <hash court> <sujet>`.
pub fn head_summary(repo: &Repository, base: &Commit<'_>) -> String {
    let branch = repo
        .head()
        .ok()
        .filter(|head| head.is_branch())
        .and_then(|head| head.shorthand().map(String::from))
        .unwrap_or_else(|| "(no branch)".to_string());
    let short = base.id().to_string()[..7].to_string();

    format!("{}: {} {}", branch, short, base.summary().unwrap_or(""))
}

/// Message par défaut d'un stash sans message explicite.
pub fn default_message(repo: &Repository) -> Result<String> {
    let base = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .map_err(|_| StashError::InitialCommitMissing)?;
    Ok(format!("WIP on {}", head_summary(repo, &base)))
}
