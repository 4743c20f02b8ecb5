use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::error::{Error, Result};

/// Transfer buffer for streaming one asset file to disk.
const COPY_BUFFER_SIZE: usize = 1024;

/// A virtual read-only hierarchy of directories and leaf files, such as a
/// packaged model-data bundle (lexicons, espeak-ng data, voice banks).
///
/// Listing a leaf returns an empty vector; that is how the walk tells files
/// and directories apart. An empty directory is therefore indistinguishable
/// from a file and ends up skipped when the open fails, which is acceptable
/// under the best-effort policy.
pub trait AssetStore {
    /// Entry names directly under `rel` ("" for the root). Empty for a leaf.
    fn list(&self, rel: &Path) -> std::io::Result<Vec<String>>;

    /// Open a leaf file for reading.
    fn open(&self, rel: &Path) -> std::io::Result<Box<dyn Read>>;
}

/// [`AssetStore`] over a plain directory tree.
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetStore for DirAssetStore {
    fn list(&self, rel: &Path) -> std::io::Result<Vec<String>> {
        let full = self.root.join(rel);
        if full.is_file() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&full)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn open(&self, rel: &Path) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(self.root.join(rel))?))
    }
}

/// Copies an asset tree into a writable destination, mirroring relative
/// paths. Used once, before first synthesis, to stage model data the engine
/// reads from the real filesystem.
///
/// Best-effort by policy: entries that cannot be listed or copied are logged
/// and skipped so one broken auxiliary file does not block an otherwise
/// constructible engine. Idempotent: files are overwritten, directory
/// creation is a no-op when the directory exists.
pub struct AssetMaterializer {
    dest_root: PathBuf,
}

impl AssetMaterializer {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
        }
    }

    /// Materialize the subtree rooted at `rel` and return the destination
    /// root. Only failure to create the destination root itself is an error;
    /// everything below is best-effort.
    pub fn materialize(&self, store: &dyn AssetStore, rel: &Path) -> Result<PathBuf> {
        info!(
            "Materializing asset tree {:?} under {}",
            rel,
            self.dest_root.display()
        );
        fs::create_dir_all(&self.dest_root).map_err(|e| Error::io(&self.dest_root, e))?;
        self.copy_tree(store, rel);
        Ok(self.dest_root.clone())
    }

    fn copy_tree(&self, store: &dyn AssetStore, rel: &Path) {
        let names = match store.list(rel) {
            Ok(names) => names,
            Err(e) => {
                error!("Failed listing {:?}: {e}", rel);
                return;
            }
        };

        if names.is_empty() {
            self.copy_file(store, rel);
            return;
        }

        let dest_dir = self.dest_root.join(rel);
        if let Err(e) = fs::create_dir_all(&dest_dir) {
            error!("Failed creating {}: {e}", dest_dir.display());
            return;
        }
        for name in names {
            self.copy_tree(store, &rel.join(name));
        }
    }

    fn copy_file(&self, store: &dyn AssetStore, rel: &Path) {
        let dest = self.dest_root.join(rel);
        let result = (|| -> std::io::Result<u64> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut reader = store.open(rel)?;
            let mut out = File::create(&dest)?;
            let mut buf = [0u8; COPY_BUFFER_SIZE];
            let mut total = 0u64;
            loop {
                let read = reader.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                out.write_all(&buf[..read])?;
                total += read as u64;
            }
            out.flush()?;
            Ok(total)
        })();

        match result {
            Ok(bytes) => debug!("Copied {:?} ({bytes} bytes)", rel),
            Err(e) => error!("Failed to copy {:?}: {e}", rel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn write_file(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    files.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn mirrors_a_nested_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("voices/voices.bin"), b"bank");
        write_file(&src.path().join("espeak-ng-data/en_dict"), b"dict");
        write_file(&src.path().join("lexicon.txt"), b"a b c");

        let store = DirAssetStore::new(src.path());
        let materializer = AssetMaterializer::new(dst.path());
        let root = materializer.materialize(&store, Path::new("")).unwrap();

        assert_eq!(root, dst.path());
        let files = snapshot(dst.path());
        assert_eq!(files.len(), 3);
        assert_eq!(files[Path::new("voices/voices.bin")], b"bank");
        assert_eq!(files[Path::new("espeak-ng-data/en_dict")], b"dict");
    }

    #[test]
    fn materializing_twice_is_idempotent() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("model/data.bin"), b"payload");

        let store = DirAssetStore::new(src.path());
        let materializer = AssetMaterializer::new(dst.path());
        materializer.materialize(&store, Path::new("")).unwrap();
        let first = snapshot(dst.path());
        materializer.materialize(&store, Path::new("")).unwrap();
        let second = snapshot(dst.path());

        assert_eq!(first, second);
    }

    #[test]
    fn copies_only_the_requested_subtree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("wanted/file.txt"), b"yes");
        write_file(&src.path().join("other/file.txt"), b"no");

        let store = DirAssetStore::new(src.path());
        let materializer = AssetMaterializer::new(dst.path());
        materializer.materialize(&store, Path::new("wanted")).unwrap();

        let files = snapshot(dst.path());
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(Path::new("wanted/file.txt")));
    }

    /// Store wrapper that refuses to list one subtree, standing in for an
    /// unreadable packaged entry.
    struct FailingSubtree<'a> {
        inner: &'a DirAssetStore,
        broken: &'a Path,
    }

    impl AssetStore for FailingSubtree<'_> {
        fn list(&self, rel: &Path) -> std::io::Result<Vec<String>> {
            if rel == self.broken {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "unreadable",
                ));
            }
            self.inner.list(rel)
        }

        fn open(&self, rel: &Path) -> std::io::Result<Box<dyn Read>> {
            self.inner.open(rel)
        }
    }

    #[test]
    fn unreadable_subtree_does_not_abort_siblings() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("bad/secret.bin"), b"x");
        write_file(&src.path().join("good/data.bin"), b"payload");

        let inner = DirAssetStore::new(src.path());
        let store = FailingSubtree {
            inner: &inner,
            broken: Path::new("bad"),
        };
        let materializer = AssetMaterializer::new(dst.path());
        materializer.materialize(&store, Path::new("")).unwrap();

        let files = snapshot(dst.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files[Path::new("good/data.bin")], b"payload");
    }
}
