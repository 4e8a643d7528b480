use std::fmt;

use thiserror::Error;

/// Périmètre de changements demandé lors d'une capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Seulement les changements indexés.
    Staged,
    /// Seulement les changements non indexés du working directory.
    Unstaged,
    /// Tous les changements locaux.
    Local,
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeScope::Staged => write!(f, "staged"),
            ChangeScope::Unstaged => write!(f, "unstaged"),
            ChangeScope::Local => write!(f, "local"),
        }
    }
}

/// Couche du snapshot en cours de construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStage {
    Index,
    Untracked,
    Worktree,
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotStage::Index => write!(f, "index"),
            SnapshotStage::Untracked => write!(f, "untracked"),
            SnapshotStage::Worktree => write!(f, "worktree"),
        }
    }
}

/// Erreurs principales de stashkit.
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Erreur git : {0}")]
    Git(#[from] git2::Error),

    #[error("Erreur I/O ({context}) : {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Aucun changement {0} à sauvegarder")]
    NoChanges(ChangeScope),

    #[error("Impossible d'indexer '{path}' : {source}")]
    Staging {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Écriture de l'arbre impossible : {0}")]
    TreeWrite(#[source] git2::Error),

    #[error("Écriture du commit impossible : {0}")]
    Commit(#[source] git2::Error),

    #[error("Échec de la couche {stage} du snapshot : {source}")]
    Snapshot {
        stage: SnapshotStage,
        #[source]
        source: Box<StashError>,
    },

    #[error("Aucun commit initial : impossible d'ancrer un stash")]
    InitialCommitMissing,

    #[error("La référence '{reference}' a été modifiée par un autre processus")]
    ConcurrentUpdate { reference: String },

    #[error("Conflits lors de l'application du stash : {}", paths.join(", "))]
    ApplyConflict { paths: Vec<String> },

    #[error("Le fichier non suivi '{path}' existe déjà")]
    UntrackedExists { path: String },

    #[error("Nettoyage ({step}) échoué : {details}")]
    Cleanup { step: &'static str, details: String },

    #[error("Stash {index} introuvable ({len} entrées)")]
    StashNotFound { index: usize, len: usize },

    #[error("État invalide : {0}")]
    InvalidState(String),
}

impl StashError {
    /// Enveloppe l'erreur dans la couche de snapshot qui a échoué.
    pub fn at_stage(self, stage: SnapshotStage) -> Self {
        StashError::Snapshot {
            stage,
            source: Box::new(self),
        }
    }

    /// Construit une erreur I/O avec contexte.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StashError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Alias pratique pour Result avec StashError.
pub type Result<T> = std::result::Result<T, StashError>;
