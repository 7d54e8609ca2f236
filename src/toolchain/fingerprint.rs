//! Content fingerprinting of resolved source trees using blake3.
//!
//! A fingerprint is the pair (content hash, newest modification time). The
//! cache key always combines both, so identical content observed at different
//! times is never deduplicated.

use jwalk::WalkDir;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Content identity of a project at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hash: ContentHash,
    /// Newest modification time in the tree, seconds since the Unix epoch.
    pub mod_time: u64,
}

impl Fingerprint {
    pub const fn new(hash: ContentHash, mod_time: u64) -> Self {
        Self { hash, mod_time }
    }

    /// Cache entry name: `<hex hash>-<mod_time>`.
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.hash.to_hex(), self.mod_time)
    }
}

/// Hash a single file's contents.
fn hash_file(path: &Path, hasher: &mut blake3::Hasher) -> io::Result<()> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Dot-prefixed component anywhere below the root (`.git`, `.DS_Store`).
pub(super) fn is_hidden(rel: &Path) -> bool {
    rel.components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// Fingerprint every non-hidden file under `root` (recursive, sorted).
///
/// `config` is mixed into the hash so a change of build settings (tags,
/// target, compiler version) changes the fingerprint like a content change.
/// Relative paths are hashed alongside contents, so renames count too.
pub fn compute_tree_fingerprint(root: &Path, config: &str) -> io::Result<Fingerprint> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(config.as_bytes());
    hasher.update(&[0]);

    let mut newest = 0u64;
    for entry in WalkDir::new(root).sort(true).skip_hidden(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(&path);
        if is_hidden(rel) {
            continue;
        }
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hash_file(&path, &mut hasher)?;

        let modified = entry
            .metadata()
            .map_err(io::Error::other)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        newest = newest.max(modified);
    }

    Ok(Fingerprint::new(
        ContentHash::new(*hasher.finalize().as_bytes()),
        newest,
    ))
}
