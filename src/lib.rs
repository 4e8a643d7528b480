//! Création, application et suppression de stashes git.
//!
//! Les snapshots sont construits avec un index jetable, publiés sur
//! `refs/stash` par compare-and-swap, puis restaurés avec un repli sans
//! l'index en cas de conflit.

pub mod config;
pub mod error;
pub mod error_display;
pub mod git;

pub use config::StashConfig;
pub use error::{ChangeScope, Result, SnapshotStage, StashError};
pub use git::{
    ApplyOutcome, DropOutcome, GitRepo, KeepMode, PushReport, PushRequest, Snapshot,
    SnapshotOptions, StashEntry, StashStore, UntrackedMode,
};
