//! 고정 경로 선택기

use std::path::{Path, PathBuf};

/// 디렉토리 + 파일 이름으로 지정된 단일 파일을 선택합니다.
#[derive(Debug, Clone)]
pub struct FixedSelector {
    path: PathBuf,
}

impl FixedSelector {
    /// 새 선택기를 생성합니다.
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    /// 대상 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 대상 파일이 존재하면 반환합니다. 없으면 경고 후 빈 목록입니다.
    pub async fn discover(&self) -> Vec<PathBuf> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => vec![self.path.clone()],
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "target is not a regular file");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "target file not available");
                Vec::new()
            }
        }
    }
}
