//! Go+ code generation ahead of `go build`.
//!
//! spx games are written in Go+ (`.spx`, `.gop`); `gop go` translates them
//! into `gop_autogen.go` files next to the sources. Module cache directories
//! are read-only, so generation runs on a writable copy of the tree.

use std::fs;
use std::io;
use std::path::Path;

use jwalk::WalkDir;

use super::fingerprint::is_hidden;

/// Source extensions that need translation before the Go compiler sees them.
const GOP_EXTENSIONS: [&str; 2] = ["spx", "gop"];

/// True when `dir` holds Go+ sources anywhere below it.
pub fn needs_codegen(dir: &Path) -> bool {
    WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            let path = entry.path();
            let visible = path.strip_prefix(dir).is_ok_and(|rel| !is_hidden(rel));
            visible
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| GOP_EXTENSIONS.contains(&ext))
        })
}

/// Copy the non-hidden tree at `src` into a fresh `dst`.
///
/// Files are rewritten rather than `fs::copy`-ed so the copies do not inherit
/// the read-only mode of the module cache.
pub fn stage_sources(src: &Path, dst: &Path) -> io::Result<()> {
    if dst.exists() {
        fs::remove_dir_all(dst)?;
    }
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).sort(true).skip_hidden(false) {
        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(src) else {
            continue;
        };
        if rel.as_os_str().is_empty() || is_hidden(rel) {
            continue;
        }

        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::write(&target, fs::read(&path)?)?;
        }
    }
    Ok(())
}
