use git2::{Repository, Status, StatusOptions};

use crate::error::Result;

/// Mode de capture des fichiers non suivis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UntrackedMode {
    /// Les fichiers non suivis sont ignorés.
    #[default]
    None,
    /// Fichiers non suivis, hors fichiers ignorés par `.gitignore`.
    Untracked,
    /// Fichiers non suivis, y compris les fichiers ignorés.
    All,
}

impl UntrackedMode {
    pub fn is_requested(self) -> bool {
        self != UntrackedMode::None
    }
}

/// État du working directory observé à un instant donné.
///
/// Jamais mis en cache : recalculé à chaque opération.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCopyState {
    /// Fichiers dont l'index diffère de HEAD.
    pub staged: Vec<String>,
    /// Fichiers suivis modifiés dans le working directory mais pas dans l'index.
    pub unstaged: Vec<String>,
    /// Fichiers non suivis (et ignorés si demandé).
    pub untracked: Vec<String>,
}

impl WorkingCopyState {
    /// Lit le status du repository.
    pub fn read(repo: &Repository, untracked: UntrackedMode) -> Result<Self> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(untracked.is_requested())
            .recurse_untracked_dirs(true)
            .include_ignored(untracked == UntrackedMode::All)
            .recurse_ignored_dirs(true)
            .exclude_submodules(true)
            .renames_head_to_index(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut state = WorkingCopyState::default();

        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let status = entry.status();

            if is_staged(status) {
                state.staged.push(path.to_string());
            }
            if is_unstaged(status) {
                state.unstaged.push(path.to_string());
            }
            if status.intersects(Status::WT_NEW | Status::IGNORED) {
                // Dépôt imbriqué : libgit2 le signale comme un seul répertoire.
                if path.ends_with('/') {
                    tracing::warn!(path, "répertoire non suivi non capturé (dépôt imbriqué)");
                    continue;
                }
                state.untracked.push(path.to_string());
            }
        }

        Ok(state)
    }

    /// Fichiers suivis dont le contenu sur disque diffère du commit de base.
    ///
    /// Union triée des fichiers indexés et non indexés, sans les fichiers
    /// qui sont redevenus non suivis (`git rm --cached`).
    pub fn tracked_changes(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .staged
            .iter()
            .chain(self.unstaged.iter())
            .filter(|path| !self.untracked.contains(path))
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Fichiers dont l'index diffère du commit de base, triés.
    pub fn staged_changes(&self) -> Vec<String> {
        let mut paths = self.staged.clone();
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Retourne true si le fichier est staged (dans l'index).
fn is_staged(status: Status) -> bool {
    status.intersects(
        Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE,
    )
}

/// Retourne true si un fichier suivi est modifié dans le working directory.
fn is_unstaged(status: Status) -> bool {
    status.intersects(
        Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_RENAMED | Status::WT_TYPECHANGE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::test_utils::*;

    #[test]
    fn test_read_splits_change_sets() {
        let (_temp_dir, repo) = create_repo_with_commit();
        commit_file(&repo, "other.txt", "other\n", "Second commit");

        create_staged_file(&repo, "tracked.txt", "staged\n");
        create_file(&repo, "other.txt", "unstaged\n");
        create_file(&repo, "new.txt", "untracked\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::Untracked).unwrap();
        assert_eq!(state.staged, vec!["tracked.txt"]);
        assert_eq!(state.unstaged, vec!["other.txt"]);
        assert_eq!(state.untracked, vec!["new.txt"]);
        assert_eq!(state.tracked_changes(), vec!["other.txt", "tracked.txt"]);
    }

    #[test]
    fn test_read_without_untracked() {
        let (_temp_dir, repo) = create_repo_with_commit();
        create_file(&repo, "new.txt", "untracked\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::None).unwrap();
        assert!(state.untracked.is_empty());
        assert!(state.staged.is_empty());
    }

    #[test]
    fn test_ignored_files_only_with_all() {
        let (_temp_dir, repo) = create_repo_with_commit();
        commit_file(&repo, ".gitignore", "*.log\n", "Ignore logs");
        create_file(&repo, "debug.log", "noise\n");
        create_file(&repo, "notes.txt", "notes\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::Untracked).unwrap();
        assert_eq!(state.untracked, vec!["notes.txt"]);

        let state = WorkingCopyState::read(&repo, UntrackedMode::All).unwrap();
        assert!(state.untracked.contains(&"debug.log".to_string()));
        assert!(state.untracked.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_nested_untracked_files_are_listed_individually() {
        let (_temp_dir, repo) = create_repo_with_commit();
        create_file(&repo, "dir/a.txt", "a\n");
        create_file(&repo, "dir/sub/b.txt", "b\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::Untracked).unwrap();
        assert_eq!(state.untracked, vec!["dir/a.txt", "dir/sub/b.txt"]);
    }

    #[test]
    fn test_nested_repository_is_not_listed() {
        let (temp_dir, repo) = create_repo_with_commit();
        Repository::init(temp_dir.path().join("sub")).unwrap();
        create_file(&repo, "sub/inner.txt", "inner\n");
        create_file(&repo, "new.txt", "new\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::Untracked).unwrap();
        assert_eq!(state.untracked, vec!["new.txt"]);
    }

    #[test]
    fn test_staged_changes_ignore_worktree() {
        let (_temp_dir, repo) = create_repo_with_commit();
        commit_file(&repo, "other.txt", "other\n", "Second commit");
        create_staged_file(&repo, "tracked.txt", "staged\n");
        create_file(&repo, "other.txt", "unstaged\n");

        let state = WorkingCopyState::read(&repo, UntrackedMode::None).unwrap();
        assert_eq!(state.staged_changes(), vec!["tracked.txt"]);
    }
}
