//! Pile de stash portée par une référence et son reflog.
//!
//! L'entrée 0 est la plus récente. L'identité d'une entrée est sa position :
//! supprimer une entrée décale toutes celles qui sont plus anciennes.

use git2::{ErrorCode, Oid, Repository};

use crate::error::{Result, StashError};

/// Entrée de stash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    pub index: usize,
    pub id: Oid,
    pub message: String,
    /// Date de création du stash (timestamp unix).
    pub timestamp: i64,
}

impl StashEntry {
    /// Nom de l'entrée au format git (`stash@{N}`).
    pub fn name(&self) -> String {
        format!("stash@{{{}}}", self.index)
    }

    /// Branche sur laquelle le stash a été créé, extraite du message
    /// (`WIP on <branche>: ...` ou `On <branche>: ...`).
    pub fn branch(&self) -> Option<&str> {
        let rest = self
            .message
            .strip_prefix("WIP on ")
            .or_else(|| self.message.strip_prefix("On "))?;
        rest.find(':').map(|end| &rest[..end])
    }
}

/// Pile de stash adossée à une référence git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashStore {
    reference: String,
}

impl StashStore {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Valeur courante de la référence, `None` si la pile est vide.
    pub fn current(&self, repo: &Repository) -> Result<Option<Oid>> {
        match repo.find_reference(&self.reference) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Publie un snapshot en haut de la pile.
    ///
    /// La valeur observée de la référence sert de valeur attendue pour le
    /// compare-and-swap.
    pub fn publish(&self, repo: &Repository, snapshot: Oid, message: &str) -> Result<()> {
        let observed = self.current(repo)?;
        self.publish_expecting(repo, snapshot, message, observed)
    }

    /// Publie un snapshot si la référence vaut encore `expected`.
    ///
    /// Échoue avec `ConcurrentUpdate` sans rien écrire si la référence a
    /// changé entre-temps.
    pub fn publish_expecting(
        &self,
        repo: &Repository,
        snapshot: Oid,
        message: &str,
        expected: Option<Oid>,
    ) -> Result<()> {
        repo.reference_ensure_log(&self.reference)?;

        let result = match expected {
            Some(old) => repo.reference_matching(&self.reference, snapshot, true, old, message),
            None => repo.reference(&self.reference, snapshot, false, message),
        };

        match result {
            Ok(_) => {
                tracing::info!(reference = %self.reference, %snapshot, "stash publié");
                Ok(())
            }
            Err(e) if matches!(e.code(), ErrorCode::Modified | ErrorCode::Exists) => {
                tracing::warn!(reference = %self.reference, %snapshot, "publication perdue face à une mise à jour concurrente");
                Err(StashError::ConcurrentUpdate {
                    reference: self.reference.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Liste les entrées, la plus récente en premier.
    pub fn entries(&self, repo: &Repository) -> Result<Vec<StashEntry>> {
        if self.current(repo)?.is_none() {
            return Ok(Vec::new());
        }

        let reflog = repo.reflog(&self.reference)?;
        let entries = reflog
            .iter()
            .enumerate()
            .map(|(index, entry)| StashEntry {
                index,
                id: entry.id_new(),
                message: entry.message().unwrap_or("").to_string(),
                timestamp: entry.committer().when().seconds(),
            })
            .collect();

        Ok(entries)
    }

    /// Nombre d'entrées dans la pile.
    pub fn len(&self, repo: &Repository) -> Result<usize> {
        if self.current(repo)?.is_none() {
            return Ok(0);
        }
        Ok(repo.reflog(&self.reference)?.len())
    }

    /// Snapshot à la position donnée.
    pub fn resolve(&self, repo: &Repository, index: usize) -> Result<Oid> {
        let len = self.len(repo)?;
        if index >= len {
            return Err(StashError::StashNotFound { index, len });
        }

        let reflog = repo.reflog(&self.reference)?;
        reflog
            .get(index)
            .map(|entry| entry.id_new())
            .ok_or(StashError::StashNotFound { index, len })
    }

    /// Supprime l'entrée à la position donnée.
    pub fn drop(&self, repo: &Repository, index: usize) -> Result<Oid> {
        let len = self.len(repo)?;
        if index >= len {
            return Err(StashError::StashNotFound { index, len });
        }

        let mut reflog = repo.reflog(&self.reference)?;
        let dropped = reflog
            .get(index)
            .map(|entry| entry.id_new())
            .ok_or(StashError::StashNotFound { index, len })?;

        reflog.remove(index, true)?;
        reflog.write()?;

        if len == 1 {
            repo.find_reference(&self.reference)?.delete()?;
            delete_reflog(repo, &self.reference)?;
        } else if index == 0 {
            let top = reflog
                .get(0)
                .map(|entry| entry.id_new())
                .ok_or_else(|| StashError::InvalidState("reflog de stash vide".into()))?;
            repo.reference(&self.reference, top, true, "")?;
            // La mise à jour de la référence ajoute une ligne au reflog : on le réécrit.
            reflog.write()?;
        }

        tracing::info!(reference = %self.reference, index, %dropped, "stash supprimé");
        Ok(dropped)
    }

    /// Supprime la référence et tout son historique.
    pub fn clear(&self, repo: &Repository) -> Result<()> {
        match repo.find_reference(&self.reference) {
            Ok(mut reference) => reference.delete()?,
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        delete_reflog(repo, &self.reference)?;

        tracing::info!(reference = %self.reference, "pile de stash vidée");
        Ok(())
    }
}

fn delete_reflog(repo: &Repository, reference: &str) -> Result<()> {
    match repo.reflog_delete(reference) {
        Ok(()) => Ok(()),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::test_utils::*;

    /// Écrit un commit détaché à publier.
    fn fake_snapshot(repo: &Repository, message: &str) -> Oid {
        let sig = repo.signature().unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        let tree = head.tree().unwrap();
        repo.commit(None, &sig, &sig, message, &tree, &[&head])
            .unwrap()
    }

    fn store() -> StashStore {
        StashStore::new("refs/stash")
    }

    fn messages(repo: &Repository) -> Vec<String> {
        store()
            .entries(repo)
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_empty_store() {
        let (_temp_dir, repo) = create_repo_with_commit();

        assert!(store().entries(&repo).unwrap().is_empty());
        assert_eq!(store().len(&repo).unwrap(), 0);
        assert!(matches!(
            store().resolve(&repo, 0),
            Err(StashError::StashNotFound { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_publish_pushes_on_top() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let first = fake_snapshot(&repo, "first");
        let second = fake_snapshot(&repo, "second");

        store().publish(&repo, first, "first").unwrap();
        store().publish(&repo, second, "second").unwrap();

        let entries = store().entries(&repo).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].name(), "stash@{0}");
        assert_eq!(entries[1].id, first);
        assert!(entries[0].timestamp > 0);
        assert_eq!(store().current(&repo).unwrap(), Some(second));
    }

    #[test]
    fn test_publish_is_visible_to_libgit2_stash() {
        let (_temp_dir, mut repo) = create_repo_with_commit();
        let snapshot = fake_snapshot(&repo, "On main: visible");

        store().publish(&repo, snapshot, "On main: visible").unwrap();

        let mut seen = Vec::new();
        repo.stash_foreach(|index, message, oid| {
            seen.push((index, message.to_string(), *oid));
            true
        })
        .unwrap();
        assert_eq!(seen, vec![(0, "On main: visible".to_string(), snapshot)]);
    }

    #[test]
    fn test_publish_with_stale_expectation_fails() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let mine = fake_snapshot(&repo, "mine");
        let theirs = fake_snapshot(&repo, "theirs");

        let observed = store().current(&repo).unwrap();
        // Un autre processus publie entre l'observation et l'écriture
        store().publish(&repo, theirs, "theirs").unwrap();

        let err = store()
            .publish_expecting(&repo, mine, "mine", observed)
            .unwrap_err();
        assert!(matches!(err, StashError::ConcurrentUpdate { .. }));
        assert_eq!(messages(&repo), vec!["theirs"]);
    }

    #[test]
    fn test_publish_with_stale_existing_value_fails() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let first = fake_snapshot(&repo, "first");
        let mine = fake_snapshot(&repo, "mine");
        let theirs = fake_snapshot(&repo, "theirs");
        store().publish(&repo, first, "first").unwrap();

        let observed = store().current(&repo).unwrap();
        store().publish(&repo, theirs, "theirs").unwrap();

        let err = store()
            .publish_expecting(&repo, mine, "mine", observed)
            .unwrap_err();
        assert!(matches!(err, StashError::ConcurrentUpdate { .. }));
        assert_eq!(messages(&repo), vec!["theirs", "first"]);
    }

    #[test]
    fn test_drop_middle_entry() {
        let (_temp_dir, repo) = create_repo_with_commit();
        for message in ["a", "b", "c"] {
            let oid = fake_snapshot(&repo, message);
            store().publish(&repo, oid, message).unwrap();
        }

        store().drop(&repo, 1).unwrap();
        assert_eq!(messages(&repo), vec!["c", "a"]);
    }

    #[test]
    fn test_drop_top_moves_reference() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let a = fake_snapshot(&repo, "a");
        let b = fake_snapshot(&repo, "b");
        store().publish(&repo, a, "a").unwrap();
        store().publish(&repo, b, "b").unwrap();

        assert_eq!(store().drop(&repo, 0).unwrap(), b);

        assert_eq!(messages(&repo), vec!["a"]);
        assert_eq!(store().current(&repo).unwrap(), Some(a));
    }

    #[test]
    fn test_drop_last_entry_deletes_reference() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let a = fake_snapshot(&repo, "a");
        store().publish(&repo, a, "a").unwrap();

        store().drop(&repo, 0).unwrap();

        assert_eq!(store().current(&repo).unwrap(), None);
        assert!(store().entries(&repo).unwrap().is_empty());
    }

    #[test]
    fn test_drop_out_of_range() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let a = fake_snapshot(&repo, "a");
        store().publish(&repo, a, "a").unwrap();

        assert!(matches!(
            store().drop(&repo, 3),
            Err(StashError::StashNotFound { index: 3, len: 1 })
        ));
        assert_eq!(messages(&repo), vec!["a"]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_temp_dir, repo) = create_repo_with_commit();
        for message in ["a", "b"] {
            let oid = fake_snapshot(&repo, message);
            store().publish(&repo, oid, message).unwrap();
        }

        store().clear(&repo).unwrap();

        assert_eq!(store().current(&repo).unwrap(), None);
        assert!(store().entries(&repo).unwrap().is_empty());
        // Vider une pile déjà vide n'est pas une erreur
        store().clear(&repo).unwrap();
    }

    #[test]
    fn test_entry_branch_from_message() {
        let entry = |message: &str| StashEntry {
            index: 0,
            id: Oid::zero(),
            message: message.to_string(),
            timestamp: 0,
        };

        assert_eq!(entry("WIP on main: abc1234 subject").branch(), Some("main"));
        assert_eq!(entry("On feature/x: message").branch(), Some("feature/x"));
        assert_eq!(entry("message libre").branch(), None);
    }
}
