//! Index jetable utilisé pour construire des arbres sans toucher à l'index
//! réel du repository.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, Tree};
use tempfile::TempDir;

use crate::error::{Result, StashError};

const MODE_FILE: u32 = 0o100644;
const MODE_EXECUTABLE: u32 = 0o100755;
const MODE_SYMLINK: u32 = 0o120000;

/// Index temporaire stocké dans un répertoire jetable sous `.git/`.
///
/// Le répertoire est supprimé au drop, que la construction ait réussi ou non.
/// Une instance ne doit pas être partagée entre deux constructions.
pub struct EphemeralIndex<'r> {
    repo: &'r Repository,
    // Déclaré avant `scratch` : l'index est libéré avant la suppression du répertoire.
    index: Index,
    scratch: TempDir,
}

impl<'r> EphemeralIndex<'r> {
    /// Crée un index temporaire, pré-rempli avec `seed` si fourni.
    pub fn acquire(repo: &'r Repository, seed: Option<&Tree<'_>>) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("stashkit-index-")
            .tempdir_in(repo.path())
            .map_err(|e| StashError::io("création de l'index temporaire", e))?;

        let mut index = Index::open(&scratch.path().join("index"))?;
        if let Some(tree) = seed {
            index.read_tree(tree)?;
        }
        index.write()?;

        tracing::trace!(path = %scratch.path().display(), "index temporaire créé");

        Ok(Self {
            repo,
            index,
            scratch,
        })
    }

    /// Chemin du répertoire temporaire (supprimé au drop).
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Indexe le contenu actuel sur disque des fichiers donnés.
    ///
    /// Un fichier absent du disque est retiré de l'index. Un fichier
    /// illisible fait échouer l'opération avec `StashError::Staging`.
    pub fn stage<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<()> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| StashError::InvalidState("repository sans working directory".into()))?;

        for path in paths {
            let path = path.as_ref();
            let full_path = workdir.join(path);

            let metadata = match fs::symlink_metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.index.remove_path(Path::new(path))?;
                    continue;
                }
                Err(source) => {
                    return Err(StashError::Staging {
                        path: path.to_string(),
                        source,
                    })
                }
            };

            let (content, mode) = if metadata.file_type().is_symlink() {
                let target = fs::read_link(&full_path).map_err(|source| StashError::Staging {
                    path: path.to_string(),
                    source,
                })?;
                (link_target_bytes(target), MODE_SYMLINK)
            } else {
                let content = fs::read(&full_path).map_err(|source| StashError::Staging {
                    path: path.to_string(),
                    source,
                })?;
                (content, file_mode(&metadata))
            };

            let id = self.repo.blob(&content)?;
            self.index.add(&entry_for(path, id, mode, content.len()))?;
        }

        self.index.write()?;
        Ok(())
    }

    /// Écrit le contenu de l'index comme objet arbre.
    pub fn write_tree(&mut self) -> Result<Oid> {
        self.index
            .write_tree_to(self.repo)
            .map_err(StashError::TreeWrite)
    }
}

fn entry_for(path: &str, id: Oid, mode: u32, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        // Indice de stat seulement : saturé au-delà de 4 Gio.
        file_size: u32::try_from(size).unwrap_or(u32::MAX),
        id,
        flags: path.len().min(0xfff) as u16,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

#[cfg(unix)]
fn link_target_bytes(target: PathBuf) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;

    target.into_os_string().into_vec()
}

#[cfg(not(unix))]
fn link_target_bytes(target: PathBuf) -> Vec<u8> {
    target.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        MODE_EXECUTABLE
    } else {
        MODE_FILE
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    MODE_FILE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::test_utils::*;

    #[test]
    fn test_acquire_empty_writes_empty_tree() {
        let (_temp_dir, repo) = create_repo_with_commit();

        let mut scratch = EphemeralIndex::acquire(&repo, None).unwrap();
        let tree = repo.find_tree(scratch.write_tree().unwrap()).unwrap();
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_seeded_from_tree() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let head_tree = repo.head().unwrap().peel_to_tree().unwrap();

        let mut scratch = EphemeralIndex::acquire(&repo, Some(&head_tree)).unwrap();
        assert_eq!(scratch.write_tree().unwrap(), head_tree.id());
    }

    #[test]
    fn test_stage_reads_disk_content() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let head_tree = repo.head().unwrap().peel_to_tree().unwrap();
        create_file(&repo, "tracked.txt", "changed\n");
        create_file(&repo, "dir/new.txt", "new\n");

        let mut scratch = EphemeralIndex::acquire(&repo, Some(&head_tree)).unwrap();
        scratch.stage(&["tracked.txt", "dir/new.txt"]).unwrap();
        let tree = repo.find_tree(scratch.write_tree().unwrap()).unwrap();

        let entry = tree.get_path(Path::new("dir/new.txt")).unwrap();
        let blob = repo.find_blob(entry.id()).unwrap();
        assert_eq!(blob.content(), b"new\n");
        let entry = tree.get_path(Path::new("tracked.txt")).unwrap();
        let blob = repo.find_blob(entry.id()).unwrap();
        assert_eq!(blob.content(), b"changed\n");

        // L'index réel n'est pas touché
        assert_eq!(
            repo.index().unwrap().write_tree().unwrap(),
            head_tree.id()
        );
    }

    #[test]
    fn test_stage_missing_file_removes_entry() {
        let (temp_dir, repo) = create_repo_with_commit();
        let head_tree = repo.head().unwrap().peel_to_tree().unwrap();
        std::fs::remove_file(temp_dir.path().join("tracked.txt")).unwrap();

        let mut scratch = EphemeralIndex::acquire(&repo, Some(&head_tree)).unwrap();
        scratch.stage(&["tracked.txt"]).unwrap();
        let tree = repo.find_tree(scratch.write_tree().unwrap()).unwrap();
        assert!(tree.get_path(Path::new("tracked.txt")).is_err());
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let (_temp_dir, repo) = create_repo_with_commit();

        let scratch = EphemeralIndex::acquire(&repo, None).unwrap();
        let path = scratch.scratch_path().to_path_buf();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_unreadable_path_fails() {
        let (_temp_dir, repo) = create_repo_with_commit();
        let workdir = repo.workdir().unwrap().to_path_buf();
        // Un répertoire ne peut pas être lu comme un fichier
        std::fs::create_dir_all(workdir.join("folder")).unwrap();

        let mut scratch = EphemeralIndex::acquire(&repo, None).unwrap();
        let path = scratch.scratch_path().to_path_buf();
        let err = scratch.stage(&["folder"]).unwrap_err();
        assert!(matches!(err, StashError::Staging { .. }));

        // Le répertoire temporaire est libéré aussi après un échec
        drop(scratch);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_symlink_keeps_raw_target() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_temp_dir, repo) = create_repo_with_commit();
        let target = OsStr::from_bytes(b"cible-\xff");
        std::os::unix::fs::symlink(target, repo.workdir().unwrap().join("link")).unwrap();

        let mut scratch = EphemeralIndex::acquire(&repo, None).unwrap();
        scratch.stage(&["link"]).unwrap();
        let tree = repo.find_tree(scratch.write_tree().unwrap()).unwrap();

        let entry = tree.get_path(Path::new("link")).unwrap();
        assert_eq!(entry.filemode(), 0o120000);
        let blob = repo.find_blob(entry.id()).unwrap();
        assert_eq!(blob.content(), b"cible-\xff");
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_entry_size_saturates() {
        let entry = entry_for("big.bin", Oid::zero(), MODE_FILE, u32::MAX as usize + 10);
        assert_eq!(entry.file_size, u32::MAX);

        let entry = entry_for("small.bin", Oid::zero(), MODE_FILE, 42);
        assert_eq!(entry.file_size, 42);
    }
}
