//! 로컬 파일시스템 오브젝트 스토리지.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{ByteStream, FileStats, ObjectStorage, SanitizedPath};
use crate::error::Result;

/// `root/bucket/` 아래를 버킷으로 취급하는 로컬 스토리지.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    /// 설정에서 생성합니다.
    pub fn from_config(config: &trader_core::StorageConfig) -> Self {
        Self::new(&config.root, &config.bucket)
    }

    /// 버킷 디렉토리.
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn full_path(&self, path: &SanitizedPath) -> PathBuf {
        self.bucket_dir().join(path.as_str())
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn file_stats(&self, path: &SanitizedPath) -> Result<Option<FileStats>> {
        let full = self.full_path(path);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(Some(FileStats { size: meta.len() })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %full.display(), "File not found in local storage");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn file_stream(&self, path: &SanitizedPath) -> Result<ByteStream> {
        let file = tokio::fs::File::open(self.full_path(path)).await?;
        Ok(Box::new(file))
    }
}
