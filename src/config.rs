//! Configuration lue depuis la config git du repository.

use git2::{Repository, Signature};

use crate::error::Result;

/// Référence utilisée par git pour la pile de stash.
pub const DEFAULT_STASH_REF: &str = "refs/stash";

const FALLBACK_NAME: &str = "stashkit";
const FALLBACK_EMAIL: &str = "stashkit@local";

/// Réglages de stashkit.
///
/// Clés lues (toutes optionnelles) :
/// - `stashkit.ref`
/// - `stashkit.includeUntracked`
/// - `stashkit.fallbackName` / `stashkit.fallbackEmail`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashConfig {
    /// Référence qui porte la pile de stash.
    pub stash_ref: String,
    /// Inclure les fichiers non suivis par défaut lors d'un push.
    pub include_untracked: bool,
    /// Signature utilisée quand `user.name`/`user.email` ne sont pas configurés.
    pub fallback_name: String,
    pub fallback_email: String,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            stash_ref: DEFAULT_STASH_REF.to_string(),
            include_untracked: false,
            fallback_name: FALLBACK_NAME.to_string(),
            fallback_email: FALLBACK_EMAIL.to_string(),
        }
    }
}

impl StashConfig {
    /// Charge la configuration depuis la config git (locale, globale, système).
    pub fn load(repo: &Repository) -> Result<Self> {
        let config = repo.config()?.snapshot()?;
        let defaults = Self::default();

        let stash_ref = config
            .get_string("stashkit.ref")
            .unwrap_or(defaults.stash_ref);
        let include_untracked = config
            .get_bool("stashkit.includeUntracked")
            .unwrap_or(defaults.include_untracked);
        let fallback_name = config
            .get_string("stashkit.fallbackName")
            .unwrap_or(defaults.fallback_name);
        let fallback_email = config
            .get_string("stashkit.fallbackEmail")
            .unwrap_or(defaults.fallback_email);

        if !stash_ref.starts_with("refs/") {
            return Err(crate::error::StashError::InvalidState(format!(
                "stashkit.ref doit commencer par 'refs/' (reçu '{}')",
                stash_ref
            )));
        }

        Ok(Self {
            stash_ref,
            include_untracked,
            fallback_name,
            fallback_email,
        })
    }

    /// Signature de l'utilisateur, ou la signature de repli.
    pub fn signature(&self, repo: &Repository) -> Result<Signature<'static>> {
        let sig = repo
            .signature()
            .or_else(|_| Signature::now(&self.fallback_name, &self.fallback_email))?;
        Ok(sig)
    }
}
