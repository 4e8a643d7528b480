use git2::{Commit, Oid, Repository, Signature};

use crate::error::{Result, StashError};

/// Écrit des commits détachés (aucune référence n'est mise à jour).
pub struct ObjectWriter<'r> {
    repo: &'r Repository,
    signature: Signature<'static>,
}

impl<'r> ObjectWriter<'r> {
    pub fn new(repo: &'r Repository, signature: Signature<'static>) -> Self {
        Self { repo, signature }
    }

    /// Commit courant de HEAD, base de tout snapshot.
    pub fn base_commit(&self) -> Result<Commit<'r>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                return Err(StashError::InitialCommitMissing)
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                return Err(StashError::InitialCommitMissing)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(head.peel_to_commit()?)
    }

    /// Écrit un commit avec l'arbre et les parents donnés.
    ///
    /// Une liste de parents vide produit un commit orphelin. Aucune
    /// recherche de commit existant équivalent n'est faite.
    pub fn commit(&self, message: &str, tree: Oid, parents: &[Oid]) -> Result<Oid> {
        let tree = self.repo.find_tree(tree).map_err(StashError::Commit)?;
        let parents = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StashError::Commit)?;
        let parent_refs: Vec<&Commit> = parents.iter().collect();

        self.repo
            .commit(
                None,
                &self.signature,
                &self.signature,
                message,
                &tree,
                &parent_refs,
            )
            .map_err(StashError::Commit)
    }
}
