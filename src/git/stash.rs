//! Sauvegarde du working directory dans un stash : construction du
//! snapshot, publication sur la pile, puis nettoyage optionnel.

use git2::Repository;

use super::reconcile::{reconcile, KeepMode};
use super::snapshot::{default_message, Snapshot, SnapshotBuilder, SnapshotOptions};
use super::store::StashStore;
use crate::config::StashConfig;
use crate::error::{Result, StashError};

/// Paramètres d'un `push`.
#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    /// Message du stash ; `WIP on <branche>: ...` si absent.
    pub message: Option<String>,
    pub options: SnapshotOptions,
    /// Nettoyage après publication ; `None` laisse le working directory intact.
    pub cleanup: Option<KeepMode>,
}

/// Résultat d'un `push` publié.
#[derive(Debug)]
pub struct PushReport {
    pub snapshot: Snapshot,
    /// Erreur de nettoyage, non fatale : le stash est déjà publié.
    pub cleanup_error: Option<StashError>,
}

/// Capture le working directory et le publie en haut de la pile.
///
/// Retourne `Ok(None)` quand il n'y a rien à capturer et que la requête
/// l'autorise.
pub fn push(
    repo: &Repository,
    store: &StashStore,
    config: &StashConfig,
    request: &PushRequest,
) -> Result<Option<PushReport>> {
    let message = match &request.message {
        Some(message) => message.clone(),
        None => default_message(repo)?,
    };

    let builder = SnapshotBuilder::new(repo, config.signature(repo)?);
    let Some(snapshot) = builder.build(&message, &request.options)? else {
        return Ok(None);
    };

    store.publish(repo, snapshot.id, &message)?;

    let cleanup_error = match request.cleanup {
        Some(keep) => reconcile(repo, &snapshot, keep).err(),
        None => None,
    };
    if let Some(err) = &cleanup_error {
        tracing::warn!(snapshot = %snapshot.id, error = %err, "stash publié mais nettoyage incomplet");
    }

    Ok(Some(PushReport {
        snapshot,
        cleanup_error,
    }))
}
