use crate::error::{ChangeScope, StashError};
use crate::git::ApplyOutcome;

/// Formate une erreur pour l'affichage utilisateur
pub fn format_error_message(err: &StashError) -> String {
    match err {
        StashError::Git(e) => format!("❌ Git: {}", e.message()),
        StashError::Io { context, source } => format!("❌ I/O ({}): {}", context, source),
        StashError::NoChanges(scope) => {
            let what = match scope {
                ChangeScope::Staged => "indexé",
                ChangeScope::Unstaged => "non indexé",
                ChangeScope::Local => "local",
            };
            format!("❌ Aucun changement {} à sauvegarder", what)
        }
        StashError::Staging { path, source } => {
            format!("❌ Impossible de lire '{}': {}", path, source)
        }
        StashError::TreeWrite(e) | StashError::Commit(e) => {
            format!("❌ Écriture dans la base d'objets échouée: {}", e.message())
        }
        StashError::Snapshot { stage, source } => {
            format!("❌ Stash non créé (couche {}): {}", stage, source)
        }
        StashError::InitialCommitMissing => {
            "❌ Aucun commit initial: créez un premier commit avant de stasher".to_string()
        }
        StashError::ConcurrentUpdate { reference } => format!(
            "❌ '{}' a été modifiée pendant l'opération, réessayez",
            reference
        ),
        StashError::ApplyConflict { paths } => {
            format!("❌ Conflits sur: {}", paths.join(", "))
        }
        StashError::UntrackedExists { path } => {
            format!("❌ '{}' existe déjà et ne sera pas écrasé", path)
        }
        StashError::Cleanup { step, details } => {
            format!("⚠ Stash créé, nettoyage ({}) incomplet: {}", step, details)
        }
        StashError::StashNotFound { index, len } => {
            format!("❌ stash@{{{}}} n'existe pas ({} entrées)", index, len)
        }
        StashError::InvalidState(msg) => format!("❌ État invalide: {}", msg),
    }
}

/// Formate le résultat d'une application de stash
pub fn format_apply_outcome(operation: &str, outcome: ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::RestoredWithIndex => format!("{} ✓", operation),
        ApplyOutcome::RestoredWorktreeOnly => format!(
            "⚠ {}: index non restauré (conflit), stash conservé",
            operation
        ),
    }
}

/// Formate un message de succès
pub fn format_success_message(operation: &str) -> String {
    format!("{} ✓", operation)
}
