// Scan configuration
// Controls which files a catalog scan picks up and how they are read

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Chunk size for streaming file hashing. Files are read in fixed chunks so a
/// multi-gigabyte file never spikes memory.
pub const HASH_CHUNK_SIZE: usize = 8192;

/// Configuration for directory scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions to index (lowercase, with leading dot).
    /// An empty list means no restriction.
    pub allowed_extensions: Vec<String>,
    /// Skip hidden directories (names starting with '.')
    pub skip_hidden: bool,
    /// Follow symbolic links while walking (off to avoid loops)
    pub follow_links: bool,
    /// Hash files on multiple threads while scanning
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![
                ".pdf", ".docx", ".txt", ".epub", ".djvu", ".zip", ".doc", ".rar",
                ".fb2", ".html", ".rtf", ".gif", ".ppt", ".mp3",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_hidden: true,
            follow_links: false,
            parallel: false,
        }
    }
}

impl ScanConfig {
    /// A configuration with no extension restriction
    pub fn all_files() -> Self {
        Self {
            allowed_extensions: Vec::new(),
            ..Default::default()
        }
    }

    /// Check whether a path passes the extension allow-list
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => format!(".{}", e.to_lowercase()),
            None => return false,
        };

        self.allowed_extensions.iter().any(|allowed| allowed.to_lowercase() == ext)
    }
}
