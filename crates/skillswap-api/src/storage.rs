use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Disk-backed object store for shared files and chat attachments.
///
/// Each object lives at `{storage_dir}/{relative_path}`; the relative path
/// is recorded alongside the file metadata so deletes don't have to guess.
pub struct Storage {
    dir: PathBuf,
    public_base_url: String,
}

impl Storage {
    pub async fn new(dir: PathBuf, public_base_url: String) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("File storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Retrievable URL for an uploaded file, served by the download route.
    pub fn download_url(&self, file_id: Uuid) -> String {
        format!("{}/files/{}/download", self.public_base_url, file_id)
    }

    /// Storage-relative path for a new upload. File names are flattened so
    /// they cannot traverse out of the storage directory.
    pub fn object_path(&self, scope: &str, file_id: Uuid, file_name: &str) -> String {
        let safe_name: String = file_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("{scope}/{file_id}_{safe_name}")
    }

    fn full_path(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }

    pub async fn save(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.full_path(relative)).await?)
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.full_path(relative)).await {
            Ok(()) => {
                info!("Deleted stored file {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", relative);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
