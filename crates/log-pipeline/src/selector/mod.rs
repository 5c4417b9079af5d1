//! 후보 파일 선택 모듈
//!
//! 사이클마다 처리할 파일과 각 파일의 재개 위치(워터마크)를 결정합니다.
//!
//! # 선택 방식
//! - [`FixedSelector`]: 설정된 디렉토리 + 파일 이름의 단일 파일
//! - [`PatternSelector`]: 디렉토리를 나열하여 이름이 패턴과 (대소문자 무시) 같은 파일을 경로순 정렬
//!
//! # 공통 후처리
//! 저장된 경로와 같은 파일은 저장된 워터마크부터, 나머지는 0부터 시작합니다.
//! 현재 라인 수가 시작 위치보다 크지 않은 파일은 이번 사이클에서 제외합니다.

pub mod fixed;
pub mod pattern;

pub use fixed::FixedSelector;
pub use pattern::PatternSelector;

use std::path::PathBuf;

use tailmetric_core::config::SourceKind;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::position::PositionRecord;
use crate::reader::IncrementalReader;

/// 이번 사이클의 후보 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 파일 경로
    pub path: PathBuf,
    /// 이미 처리된 마지막 라인 (이 다음부터 읽음)
    pub watermark: u64,
    /// 선택 시점에 관찰한 전체 라인 수
    pub total_lines: u64,
}

/// 후보 파일 선택기
///
/// 시작 시 설정에서 한 번 결정됩니다.
#[derive(Debug, Clone)]
pub enum FileSelector {
    /// 고정 경로
    Fixed(FixedSelector),
    /// 디렉토리 패턴 매칭
    Pattern(PatternSelector),
}

impl FileSelector {
    /// 설정에 맞는 선택기를 생성합니다.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.source {
            SourceKind::Fixed => {
                Self::Fixed(FixedSelector::new(&config.file_dir, &config.file_pattern))
            }
            SourceKind::Pattern => {
                Self::Pattern(PatternSelector::new(&config.file_dir, &config.file_pattern))
            }
        }
    }

    /// 선택 방식 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Pattern(_) => "pattern",
        }
    }

    /// 이번 사이클의 후보 집합을 계산합니다.
    ///
    /// 디렉토리를 나열할 수 없으면 `Select` 에러를 반환합니다.
    /// 개별 파일의 라인 수를 셀 수 없으면 경고를 남기고 그 파일만 제외합니다.
    pub async fn select(
        &self,
        position: &PositionRecord,
        reader: &IncrementalReader,
    ) -> Result<Vec<Candidate>, LogPipelineError> {
        let paths = match self {
            Self::Fixed(s) => s.discover().await,
            Self::Pattern(s) => s.discover().await?,
        };

        let mut candidates = Vec::with_capacity(paths.len());
        for path in paths {
            let total_lines = match reader.count_lines(&path).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable candidate");
                    continue;
                }
            };

            let watermark = position.watermark_for(&path).unwrap_or(0);
            if total_lines <= watermark {
                tracing::debug!(
                    path = %path.display(),
                    watermark,
                    total_lines,
                    "no new lines past watermark, skipping"
                );
                continue;
            }

            candidates.push(Candidate {
                path,
                watermark,
                total_lines,
            });
        }

        Ok(candidates)
    }
}
