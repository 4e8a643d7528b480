use git2::{BranchType, Commit, Repository};

use crate::error::{Result, StashError};

/// Crée une branche locale pointant sur `target`.
///
/// Échoue si une branche du même nom existe déjà.
pub fn create_branch_at(repo: &Repository, name: &str, target: &Commit<'_>) -> Result<()> {
    if repo.find_branch(name, BranchType::Local).is_ok() {
        return Err(StashError::InvalidState(format!(
            "la branche '{}' existe déjà",
            name
        )));
    }
    repo.branch(name, target, false)?;
    Ok(())
}

/// Checkout une branche existante.
///
/// Le checkout est « safe » : les modifications locales qui seraient écrasées
/// font échouer l'opération avant toute écriture.
pub fn checkout_branch(repo: &Repository, name: &str) -> Result<()> {
    let refname = format!("refs/heads/{}", name);
    let obj = repo.revparse_single(&refname)?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(&obj, Some(&mut checkout))?;
    repo.set_head(&refname)?;
    Ok(())
}
