//! 증분 라인 리더
//!
//! [`IncrementalReader`]는 후보 파일의 전체 라인 수를 세고, 워터마크 이후의
//! 라인 구간만 읽어 반환합니다. 라인 번호는 1부터 시작합니다.
//!
//! 라인 수를 센 뒤 파일이 계속 자라더라도 관찰한 라인 수까지만 읽으며,
//! 이후 추가된 라인은 다음 사이클에서 처리됩니다.
//!
//! 줄바꿈으로 끝나지 않은 마지막 라인은 아직 쓰이는 중인 것으로 보고 세지 않습니다.
//! 작성자가 줄바꿈을 쓴 뒤의 사이클에서 완성된 내용으로 읽힙니다.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::error::LogPipelineError;

const READ_CHUNK: usize = 64 * 1024;

/// 번호가 붙은 로그 라인
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedLine {
    /// 1부터 시작하는 라인 번호
    pub number: u64,
    /// 줄바꿈 문자를 제외한 라인 내용
    pub text: String,
}

/// 증분 라인 리더
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalReader {
    /// 파일당 한 번에 읽을 최대 라인 수
    max_lines: Option<u64>,
}

impl IncrementalReader {
    /// 새 리더를 생성합니다. `None`이면 읽기 상한이 없습니다.
    pub fn new(max_lines: Option<u64>) -> Self {
        Self { max_lines }
    }

    /// 파일에서 줄바꿈으로 끝나는 완성된 라인 수를 셉니다.
    pub async fn count_lines(&self, path: &Path) -> Result<u64, LogPipelineError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| read_error(path, &e))?;

        let mut buf = vec![0u8; READ_CHUNK];
        let mut count = 0u64;

        loop {
            let n = file.read(&mut buf).await.map_err(|e| read_error(path, &e))?;
            if n == 0 {
                break;
            }
            count += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        }

        Ok(count)
    }

    /// 이번 사이클에서 읽을 구간의 끝(미포함)을 계산합니다.
    ///
    /// `watermark` 이후부터 `total`까지, 읽기 상한이 있으면 그만큼만 읽습니다.
    pub fn window_end(&self, watermark: u64, total: u64) -> u64 {
        let end = total.saturating_add(1);
        match self.max_lines {
            Some(max) => end.min(watermark.saturating_add(1).saturating_add(max)),
            None => end,
        }
    }

    /// `[first_line, end_exclusive)` 구간의 라인을 순서대로 읽습니다.
    ///
    /// 파일이 그 사이에 줄어들었다면 끝까지 읽은 라인만 반환합니다.
    /// 유효하지 않은 UTF-8은 대체 문자로 변환합니다.
    pub async fn read_range(
        &self,
        path: &Path,
        first_line: u64,
        end_exclusive: u64,
    ) -> Result<Vec<NumberedLine>, LogPipelineError> {
        let first_line = first_line.max(1);
        if first_line >= end_exclusive {
            return Ok(Vec::new());
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| read_error(path, &e))?;
        let mut reader = BufReader::new(file);

        let capacity = usize::try_from(end_exclusive - first_line).unwrap_or(0);
        let mut lines = Vec::with_capacity(capacity.min(4096));
        let mut buf = Vec::new();
        let mut number = 0u64;

        while number + 1 < end_exclusive {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| read_error(path, &e))?;
            if n == 0 {
                break;
            }
            number += 1;

            if number < first_line {
                continue;
            }

            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }
            lines.push(NumberedLine {
                number,
                text: String::from_utf8_lossy(&buf).into_owned(),
            });
        }

        Ok(lines)
    }
}

fn read_error(path: &Path, err: &std::io::Error) -> LogPipelineError {
    LogPipelineError::Read {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn counts_only_terminated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let reader = IncrementalReader::default();

        assert_eq!(reader.count_lines(&write(&dir, "a", "")).await.unwrap(), 0);
        assert_eq!(reader.count_lines(&write(&dir, "b", "x\ny\n")).await.unwrap(), 2);
        assert_eq!(reader.count_lines(&write(&dir, "c", "x\ny")).await.unwrap(), 1);
        assert_eq!(reader.count_lines(&write(&dir, "e", "partial")).await.unwrap(), 0);
        assert_eq!(reader.count_lines(&write(&dir, "d", "\n\n\n")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reads_only_requested_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.log", "l1\nl2\r\nl3\nl4\n");
        let reader = IncrementalReader::default();

        let lines = reader.read_range(&path, 2, 4).await.unwrap();
        assert_eq!(
            lines,
            vec![
                NumberedLine { number: 2, text: "l2".to_owned() },
                NumberedLine { number: 3, text: "l3".to_owned() },
            ]
        );
    }

    #[tokio::test]
    async fn growth_after_count_is_left_for_next_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.log", "l1\nl2\n");
        let reader = IncrementalReader::default();

        let total = reader.count_lines(&path).await.unwrap();
        std::fs::write(&path, "l1\nl2\nl3\n").unwrap();

        let lines = reader
            .read_range(&path, 1, reader.window_end(0, total))
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number, 2);
    }

    #[tokio::test]
    async fn partial_tail_is_read_once_completed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.log", "l1\nl2-par");
        let reader = IncrementalReader::default();

        let total = reader.count_lines(&path).await.unwrap();
        let lines = reader
            .read_range(&path, 1, reader.window_end(0, total))
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "l1");

        std::fs::write(&path, "l1\nl2-partial-done\n").unwrap();
        let total = reader.count_lines(&path).await.unwrap();
        let lines = reader
            .read_range(&path, 2, reader.window_end(1, total))
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec![NumberedLine { number: 2, text: "l2-partial-done".to_owned() }]
        );
    }

    #[tokio::test]
    async fn truncated_file_returns_what_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.log", "l1\n");
        let lines = IncrementalReader::default()
            .read_range(&path, 1, 10)
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = IncrementalReader::default();
        let missing = dir.path().join("gone.log");

        assert!(matches!(
            reader.count_lines(&missing).await,
            Err(LogPipelineError::Read { .. })
        ));
        assert!(matches!(
            reader.read_range(&missing, 1, 3).await,
            Err(LogPipelineError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.log");
        std::fs::write(&path, b"ok\n\xff\xfe\n").unwrap();

        let lines = IncrementalReader::default()
            .read_range(&path, 1, 3)
            .await
            .unwrap();
        assert_eq!(lines[0].text, "ok");
        assert!(lines[1].text.contains('\u{FFFD}'));
    }

    #[test]
    fn window_end_respects_cap() {
        let unbounded = IncrementalReader::new(None);
        assert_eq!(unbounded.window_end(3, 10), 11);

        let capped = IncrementalReader::new(Some(4));
        assert_eq!(capped.window_end(3, 10), 8);
        assert_eq!(capped.window_end(8, 10), 11);
    }
}
