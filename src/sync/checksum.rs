use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use sha1::{Digest, Sha1};

/// SHA-1 digest of a file, base64-encoded the way the catalog encodes its
/// `checksum` field, so the two compare as plain strings.
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Delete regular files directly inside `dir` whose stem is not a known
/// asset id. Returns how many were removed.
///
/// Not recursive, and a failed deletion never stops the pass. Thumbnail
/// siblings (`{id}.jpg` next to `{id}.cr2`) share the asset's stem and
/// survive.
pub fn delete_orphans(dir: &Path, valid_ids: &BTreeSet<String>) -> std::io::Result<usize> {
    let mut removed = 0usize;
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let stem = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        if valid_ids.contains(&stem) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted orphan {}", path.display());
                removed += 1;
            }
            Err(e) => tracing::warn!("Could not delete {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
