//! 디렉토리 패턴 선택기
//!
//! 디렉토리의 항목 중 이름이 패턴과 대소문자 무시로 같은 일반 파일을 찾아
//! 경로 사전순으로 정렬합니다.

use std::path::{Path, PathBuf};

use crate::error::LogPipelineError;

/// 디렉토리 패턴 선택기
#[derive(Debug, Clone)]
pub struct PatternSelector {
    dir: PathBuf,
    pattern: String,
}

impl PatternSelector {
    /// 새 선택기를 생성합니다.
    pub fn new(dir: impl AsRef<Path>, pattern: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            pattern: pattern.trim().to_owned(),
        }
    }

    /// 파일 이름이 패턴과 일치하는지 확인합니다.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.to_lowercase() == self.pattern.to_lowercase()
    }

    /// 일치하는 파일을 정렬된 순서로 반환합니다.
    pub async fn discover(&self) -> Result<Vec<PathBuf>, LogPipelineError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.select_error(&e))?;

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.select_error(&e))? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.matches(name) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "matching entry vanished");
                }
            }
        }

        found.sort();
        Ok(found)
    }

    fn select_error(&self, err: &std::io::Error) -> LogPipelineError {
        LogPipelineError::Select {
            dir: self.dir.display().to_string(),
            reason: err.to_string(),
        }
    }
}
