pub mod apply;
pub mod branch;
pub mod ephemeral_index;
pub mod object_writer;
pub mod reconcile;
pub mod repo;
pub mod snapshot;
pub mod stash;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod tests;

pub use apply::{ApplyOutcome, DropOutcome, StashApplier};
pub use reconcile::KeepMode;
pub use repo::GitRepo;
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotOptions};
pub use stash::{PushReport, PushRequest};
pub use status::{UntrackedMode, WorkingCopyState};
pub use store::{StashEntry, StashStore};
