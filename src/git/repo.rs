use git2::Repository;

use super::apply::{ApplyOutcome, DropOutcome, StashApplier};
use super::stash::{PushReport, PushRequest};
use super::store::{StashEntry, StashStore};
use crate::config::StashConfig;
use crate::error::Result;

/// Wrapper haut-niveau : repository, pile de stash et configuration.
pub struct GitRepo {
    pub repo: Repository,
    pub store: StashStore,
    pub config: StashConfig,
}

impl GitRepo {
    /// Ouvre le repository git dans le répertoire donné.
    pub fn open(path: &str) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Self::from_repository(repo)
    }

    /// Enveloppe un repository déjà ouvert.
    pub fn from_repository(repo: Repository) -> Result<Self> {
        let config = StashConfig::load(&repo)?;
        let store = StashStore::new(config.stash_ref.clone());
        Ok(Self {
            repo,
            store,
            config,
        })
    }

    /// Retourne le nom de la branche courante (HEAD).
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        let name = head.shorthand().unwrap_or("HEAD détachée").to_string();
        Ok(name)
    }

    /// Crée un stash.
    pub fn push(&self, request: &PushRequest) -> Result<Option<PushReport>> {
        super::stash::push(&self.repo, &self.store, &self.config, request)
    }

    /// Retourne la liste des stashes, le plus récent en premier.
    pub fn stashes(&self) -> Result<Vec<StashEntry>> {
        self.store.entries(&self.repo)
    }

    /// Applique un stash sans le supprimer.
    pub fn apply(&self, index: usize) -> Result<ApplyOutcome> {
        self.applier().apply_entry(index)
    }

    /// Applique et supprime le stash à l'index donné.
    pub fn pop(&self, index: usize) -> Result<ApplyOutcome> {
        self.applier().pop(index)
    }

    /// Supprime un ou plusieurs stashes.
    pub fn drop<F>(&self, indices: &[usize], confirm: F) -> Result<DropOutcome>
    where
        F: FnOnce(&[StashEntry]) -> bool,
    {
        self.applier().drop(indices, confirm)
    }

    /// Supprime tous les stashes.
    pub fn clear(&self) -> Result<()> {
        self.store.clear(&self.repo)
    }

    /// Crée une branche depuis un stash et l'y applique.
    pub fn branch(&self, index: usize, name: &str) -> Result<ApplyOutcome> {
        self.applier().branch(index, name)
    }

    fn applier(&self) -> StashApplier<'_> {
        StashApplier::new(&self.repo, &self.store)
    }
}
