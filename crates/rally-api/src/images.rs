use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// Content types accepted for profile and petition images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
}

impl ImageType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Recovers the type from a stored file name.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

/// `user_4.png`, `petition_12.jpeg`. Names are derived from ids only, never
/// from anything the client sent.
pub fn image_filename(owner_kind: &str, id: i64, kind: ImageType) -> String {
    format!("{}_{}.{}", owner_kind, id, kind.extension())
}

/// Flat directory of image files.
pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, max_bytes: usize) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir, max_bytes })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(name)).await?)
    }

    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.path(name), data).await?;
        info!("Stored image {} ({} bytes)", name, data.len());
        Ok(())
    }

    /// Removing a file that is already gone is not an error.
    pub async fn remove(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)).await {
            Ok(()) => {
                info!("Deleted image {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the file a replaced image used to live in. A same-named
    /// replacement was already overwritten in place and is kept.
    pub async fn remove_replaced(&self, previous: Option<&str>, current: &str) -> Result<()> {
        match previous {
            Some(old) if old != current => self.remove(old).await,
            _ => Ok(()),
        }
    }
}
