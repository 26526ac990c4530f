use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Content-addressed store for uploaded bill images.
/// Layout: `<dir>/<first_2_hex_chars>/<sha256_hex>.<ext>`
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keep `data`, returning where it lives. Re-uploading the same image is a no-op.
    pub fn save(&self, data: &[u8], original_name: Option<&str>) -> io::Result<PathBuf> {
        let hex = to_hex(&sha256_bytes(data));
        let ext = original_name.and_then(extension_of).unwrap_or_else(|| "bin".to_string());
        let path = stored_path(&self.dir, &hex, &ext);
        if path.exists() {
            tracing::debug!("Upload already stored: {}", path.display());
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

fn stored_path(dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    dir.join(&hash_hex[..2]).join(format!("{hash_hex}.{ext}"))
}

/// Lowercased extension of a client-supplied name, ASCII alphanumerics only.
fn extension_of(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}
