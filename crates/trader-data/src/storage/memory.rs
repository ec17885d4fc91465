//! 인메모리 오브젝트 스토리지.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ByteStream, FileStats, ObjectStorage, SanitizedPath};
use crate::error::{DataError, Result};

/// 경로별 바이트를 메모리에 보관하는 스토리지.
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    /// 크기 조회 없이 보고할 크기 (대용량 파일 흉내)
    reported_sizes: RwLock<HashMap<String, u64>>,
    accesses: AtomicUsize,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 파일을 추가합니다.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), content.into());
        }
    }

    /// 실제 내용과 무관하게 `file_stats`가 보고할 크기를 지정합니다.
    pub fn set_reported_size(&self, path: impl Into<String>, size: u64) {
        if let Ok(mut sizes) = self.reported_sizes.write() {
            sizes.insert(path.into(), size);
        }
    }

    /// 스토리지 호출 횟수 (`file_stats` + `file_stream`).
    pub fn access_count(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn file_stats(&self, path: &SanitizedPath) -> Result<Option<FileStats>> {
        self.accesses.fetch_add(1, Ordering::Relaxed);

        let reported = self
            .reported_sizes
            .read()
            .ok()
            .and_then(|sizes| sizes.get(path.as_str()).copied());

        let files = self
            .files
            .read()
            .map_err(|_| DataError::Io(std::io::Error::other("storage lock poisoned")))?;
        Ok(files.get(path.as_str()).map(|content| FileStats {
            size: reported.unwrap_or(content.len() as u64),
        }))
    }

    async fn file_stream(&self, path: &SanitizedPath) -> Result<ByteStream> {
        self.accesses.fetch_add(1, Ordering::Relaxed);

        let files = self
            .files
            .read()
            .map_err(|_| DataError::Io(std::io::Error::other("storage lock poisoned")))?;
        let content = files
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| DataError::FileNotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(content)))
    }
}
