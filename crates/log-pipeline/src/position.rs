//! 읽기 위치 저장소
//!
//! [`PositionStore`]는 마지막으로 처리한 파일 경로와 라인 번호(워터마크)를
//! key=value 텍스트 파일에 저장합니다. 프로세스가 재시작되어도 이미 전송한
//! 라인을 다시 처리하지 않도록 하는 것이 목적입니다.
//!
//! # 파일 형식
//! ```text
//! # tailmetric read position
//! last.analysed.file.path=/var/log/app/fcr.log
//! last.analysed.line.number=42
//! ```
//!
//! # 워터마크 규칙
//! - 0-based: 워터마크 `k`는 1..=k 라인이 처리되었음을 의미하며, 다음 읽기는 `k + 1`부터
//! - 같은 파일에 대해 워터마크는 감소하지 않음
//! - 커밋은 임시 파일에 쓴 뒤 rename 하므로 기존 레코드가 찢어진 상태로 남지 않음

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::LogPipelineError;

/// 마지막 처리 파일 경로 키
pub const FILE_PATH_KEY: &str = "last.analysed.file.path";

/// 마지막 처리 라인 번호 키
pub const LINE_NUMBER_KEY: &str = "last.analysed.line.number";

/// 위치 레코드
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionRecord {
    /// 마지막 처리 파일 경로 (최초 실행 시 빈 경로)
    pub file_path: PathBuf,
    /// 마지막으로 처리가 확정된 라인 번호
    pub last_line: u64,
}

impl PositionRecord {
    /// 저장된 경로가 비어 있는지 (최초 실행) 확인합니다.
    pub fn is_fresh(&self) -> bool {
        self.file_path.as_os_str().is_empty()
    }

    /// 주어진 파일이 저장된 파일과 같으면 워터마크를 반환합니다.
    pub fn watermark_for(&self, path: &Path) -> Option<u64> {
        (!self.is_fresh() && self.file_path == path).then_some(self.last_line)
    }

    fn to_properties(&self) -> String {
        format!(
            "# tailmetric read position\n{FILE_PATH_KEY}={}\n{LINE_NUMBER_KEY}={}\n",
            escape_value(&self.file_path.to_string_lossy()),
            self.last_line
        )
    }

    fn from_properties(content: &str) -> Self {
        let mut record = Self::default();

        for raw in content.lines() {
            let line = raw.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some((key, value)) = split_entry(line) else {
                continue;
            };

            match key.as_str() {
                FILE_PATH_KEY => record.file_path = PathBuf::from(value),
                LINE_NUMBER_KEY => match value.trim().parse::<u64>() {
                    Ok(n) => record.last_line = n,
                    Err(_) => {
                        tracing::warn!(value = %value, "invalid line number in position file, using 0");
                    }
                },
                _ => {}
            }
        }

        record
    }
}

/// 읽기 위치 저장소
///
/// 오케스트레이터가 단독 소유하며, 한 번에 하나의 레코드만 추적합니다.
#[derive(Debug)]
pub struct PositionStore {
    path: PathBuf,
    record: PositionRecord,
}

impl PositionStore {
    /// 위치 파일을 로드합니다.
    ///
    /// 파일이 없거나 읽을 수 없으면 기본 레코드(빈 경로, 라인 0)로 새로 만듭니다.
    /// 기본 파일을 만들 수 없으면 `Persistence` 에러를 반환합니다.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LogPipelineError> {
        let path = path.into();

        let record = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record = PositionRecord::from_properties(&String::from_utf8_lossy(&bytes));
                tracing::info!(
                    index = %path.display(),
                    file = %record.file_path.display(),
                    line = record.last_line,
                    "read position loaded"
                );
                return Ok(Self { path, record });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(index = %path.display(), "position file not found, creating defaults");
                PositionRecord::default()
            }
            Err(e) => {
                tracing::warn!(
                    index = %path.display(),
                    error = %e,
                    "position file unreadable, recreating with defaults"
                );
                PositionRecord::default()
            }
        };

        let store = Self { path, record };
        store.persist().await?;
        Ok(store)
    }

    /// 현재 레코드를 반환합니다.
    pub fn record(&self) -> &PositionRecord {
        &self.record
    }

    /// 위치 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 위치를 커밋합니다.
    ///
    /// 같은 파일에 대해 더 낮은 라인 번호는 무시하고 `Ok(false)`를 반환합니다.
    /// 같은 값이면 디스크 쓰기 없이 `Ok(true)`입니다.
    ///
    /// 저장이 실패해도 메모리 레코드는 새 값으로 갱신되어 있습니다.
    pub async fn commit(&mut self, file_path: &Path, last_line: u64) -> Result<bool, LogPipelineError> {
        if let Some(current) = self.record.watermark_for(file_path) {
            if last_line < current {
                tracing::debug!(
                    file = %file_path.display(),
                    current,
                    requested = last_line,
                    "ignoring backwards position commit"
                );
                return Ok(false);
            }
            if last_line == current {
                return Ok(true);
            }
        }

        self.record = PositionRecord {
            file_path: file_path.to_path_buf(),
            last_line,
        };
        self.persist().await?;
        Ok(true)
    }

    async fn persist(&self) -> Result<(), LogPipelineError> {
        let content = self.record.to_properties();
        write_atomic(&self.path, content.as_bytes())
            .await
            .map_err(|e| LogPipelineError::Persistence {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = line.chars();
    let mut escaped = false;

    for c in chars.by_ref() {
        if escaped {
            key.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                let value: String = chars.collect();
                return Some((key.trim().to_owned(), unescape_value(value.trim_start())));
            }
            _ => key.push(c),
        }
    }

    None
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
