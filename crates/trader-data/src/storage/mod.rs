//! 오브젝트 스토리지 추상화.
//!
//! 리더는 `ObjectStorage` trait을 통해서만 원본 파일에 접근합니다.
//! - `LocalObjectStorage` - 로컬 파일시스템 (`root/bucket/path`)
//! - `InMemoryObjectStorage` - 테스트 및 임베디드 용도
//!
//! 스토리지에 전달되는 경로는 항상 `location::sanitize_path`를 통과한
//! 버킷 기준 상대 경로입니다.

pub mod local;
pub mod location;
pub mod memory;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;

pub use local::LocalObjectStorage;
pub use location::{normalize_location, resolve_location, sanitize_path, SanitizedPath};
pub use memory::InMemoryObjectStorage;

/// 파일 메타데이터.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// 바이트 단위 크기
    pub size: u64,
}

/// 바이트 스트림.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// 오브젝트 스토리지 인터페이스.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 파일 메타데이터를 조회합니다. 파일이 없으면 `None`.
    async fn file_stats(&self, path: &SanitizedPath) -> Result<Option<FileStats>>;

    /// 파일 내용을 스트림으로 엽니다.
    async fn file_stream(&self, path: &SanitizedPath) -> Result<ByteStream>;
}
