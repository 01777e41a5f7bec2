use serde::Deserialize;

/// Album entry from the album listing endpoint. Only enough to resolve a
/// configured album name to an id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub album_name: String,
}

/// Album payload with its asset entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDetail {
    #[serde(default)]
    pub assets: Vec<AssetMetadata>,
}

/// Per-asset metadata.
///
/// The server omits fields it does not know, so everything except the id
/// defaults: a `file_size` of 0 means the size must be probed separately.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub id: String,
    #[serde(default)]
    pub original_file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub checksum: String,
}

impl AssetMetadata {
    /// Local filename for this asset: the id plus the original file's
    /// extension, so `a1` with `beach.jpg` is stored as `a1.jpg`.
    pub fn local_file_name(&self) -> String {
        format!("{}{}", self.id, extension_of(&self.original_file_name))
    }
}

/// Extension of `name` including the leading dot.
///
/// Empty when the name has no real extension: a lone leading dot
/// (`.bashrc`) or trailing dot (`photo.`) does not count.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i > 0 && i + 1 < name.len() => &name[i..],
        _ => "",
    }
}
