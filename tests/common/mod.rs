//! Helpers pour les tests d'intégration.

#![allow(dead_code)]

use std::path::Path;

use git2::Repository;
use stashkit::GitRepo;
use tempfile::TempDir;

/// Repository de test avec un commit initial contenant `file.txt`.
pub struct TestRepo {
    _temp_dir: TempDir,
    pub git: GitRepo,
}

impl TestRepo {
    /// Crée un nouveau repo de test.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(temp_dir.path(), &opts).unwrap();

        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }

        let git = GitRepo::from_repository(repo).unwrap();
        let test_repo = Self {
            _temp_dir: temp_dir,
            git,
        };
        test_repo.create_file("file.txt", "initial\n");
        test_repo.stage_file("file.txt");
        test_repo.commit("Initial commit");
        test_repo
    }

    pub fn repo(&self) -> &Repository {
        &self.git.repo
    }

    /// Crée un fichier dans le repo.
    pub fn create_file(&self, path: &str, content: &str) {
        let full_path = self.repo().workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
    }

    /// Lit un fichier du repo, `None` s'il n'existe pas.
    pub fn read_file(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.repo().workdir().unwrap().join(path)).ok()
    }

    /// Stage un fichier.
    pub fn stage_file(&self, path: &str) {
        let mut index = self.repo().index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
    }

    /// Commit les changements stagés.
    pub fn commit(&self, message: &str) -> git2::Oid {
        let repo = self.repo();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        let mut index = repo.index().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();

        let parent_commit = repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| repo.find_commit(oid).ok());
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// Arbre de l'index courant.
    pub fn index_tree(&self) -> git2::Oid {
        self.repo().index().unwrap().write_tree().unwrap()
    }

    /// Messages des stashes, le plus récent en premier.
    pub fn stash_messages(&self) -> Vec<String> {
        self.git
            .stashes()
            .unwrap()
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }
}
