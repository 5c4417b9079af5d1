//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 로그 파일 선택부터 실제 TCP 싱크 전송, 위치 커밋까지의 흐름을 검증합니다.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tailmetric_core::config::{ParserKind, SenderKind, SourceKind, TailmetricConfig};
use tailmetric_core::error::SinkError;
use tailmetric_core::pipeline::MetricSink;
use tailmetric_core::types::MetricRecord;
use tailmetric_log_pipeline::{PipelineConfig, PositionStore, TailPipelineBuilder};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// 받은 라인을 모두 모으는 TCP 수신기
async fn spawn_line_collector() -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = received.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = String::new();
            if stream.read_to_string(&mut buf).await.is_ok() {
                sink.lock().unwrap().extend(buf.lines().map(str::to_owned));
            }
        }
    });

    (port, received)
}

fn core_config(dir: &Path, parser: &str, source: &str, pattern: &str, port: u16) -> TailmetricConfig {
    let toml = format!(
        r#"
[collector]
source = "{source}"
parser = "{parser}"
file_dir = "{logs}"
file_pattern = "{pattern}"
index_path = "{index}"

[metric]
name = "fcr_duration"
template = "${{metric.name}} ${{metric.value}} ${{metric.timestamp}}"

[sender]
kind = "telnet"
address = "127.0.0.1"
port = {port}
timeout_secs = 5
"#,
        logs = dir.join("logs").display(),
        index = dir.join("file-index.properties").display(),
    );
    let config = TailmetricConfig::parse(&toml).expect("config parses");
    config.validate().expect("config validates");
    config
}

/// 상관관계 로그 -> 소켓 싱크 -> 위치 커밋 전체 흐름
#[tokio::test]
async fn correlation_log_to_socket_sink() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("logs")).expect("logs dir");
    std::fs::write(
        dir.path().join("logs").join("fcr.log"),
        "wyslijPlik:poczatek:1420070400:f1\n\
         usunPlik:poczatek:1420070401:f1\n\
         wyslijPlik:koniec:1420070412:f1\n\
         \n\
         usunPlik:koniec:1420070403:f1\n",
    )
    .expect("write log");

    let (port, received) = spawn_line_collector().await;
    let core = core_config(dir.path(), "fcr", "fixed", "fcr.log", port);
    assert_eq!(core.sender.kind, SenderKind::Socket);

    let config = PipelineConfig::from_core(&core);
    let mut pipeline = TailPipelineBuilder::new()
        .config(config)
        .sink_from_config()
        .build()
        .await
        .expect("pipeline builds");

    let report = pipeline.run_cycle().await;
    assert_eq!(report.metrics_sent, 2);
    assert_eq!(report.send_failures, 0);

    // 수신 태스크가 마지막 연결을 처리할 시간을 줌
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        *received.lock().unwrap(),
        vec![
            "fcr_duration 12.0 1420070412".to_owned(),
            "fcr_duration 2.0 1420070403".to_owned(),
        ]
    );

    let stored = PositionStore::open(dir.path().join("file-index.properties"))
        .await
        .expect("reopen index");
    assert_eq!(stored.record().last_line, 5);
    assert!(stored.record().file_path.ends_with("fcr.log"));
}

/// 싱크가 꺼져 있으면 워터마크가 멈추고, 다시 켜지면 같은 라인부터 재전송
#[tokio::test]
async fn unreachable_sink_stalls_then_recovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("logs")).expect("logs dir");
    std::fs::write(
        dir.path().join("logs").join("throughput.log"),
        "1420070400:10\n1420070460:20\n",
    )
    .expect("write log");

    // 포트를 예약했다가 닫아 연결 거부 상태를 만듦
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let mut core = core_config(dir.path(), "throughput", "fixed", "throughput.log", port);
    core.metric.name = "throughput".to_owned();
    let config = PipelineConfig::from_core(&core);
    assert_eq!(config.parser, ParserKind::Field);

    let mut pipeline = TailPipelineBuilder::new()
        .config(config.clone())
        .sink_from_config()
        .build()
        .await
        .expect("pipeline builds");

    let report = pipeline.run_cycle().await;
    assert_eq!(report.send_failures, 2);
    assert!(pipeline.position().is_fresh());
    drop(pipeline);

    // 같은 포트로 수신기를 다시 띄우고 재시작
    let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = String::new();
            if stream.read_to_string(&mut buf).await.is_ok() {
                sink.lock().unwrap().extend(buf.lines().map(str::to_owned));
            }
        }
    });

    let mut restarted = TailPipelineBuilder::new()
        .config(config)
        .sink_from_config()
        .build()
        .await
        .expect("pipeline builds");
    let report = restarted.run_cycle().await;
    assert_eq!(report.metrics_sent, 2);
    assert_eq!(restarted.position().last_line, 2);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(received.lock().unwrap().len(), 2);
}

/// 디렉토리 패턴 모드에서 파일은 경로순으로 처리됨
#[tokio::test]
async fn pattern_source_processes_files_in_sorted_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logs = dir.path().join("logs");
    std::fs::create_dir_all(&logs).expect("logs dir");
    std::fs::write(logs.join("ce_traffic.log"), "in_b 2 1420070400\n").expect("write");
    std::fs::write(logs.join("CE_TRAFFIC.LOG"), "in_a 1 1420070400\n").expect("write");
    std::fs::write(logs.join("Ce_Traffic.Log"), "in_c 3 1420070400\n").expect("write");
    std::fs::write(logs.join("unrelated.log"), "in_x 9 1420070400\n").expect("write");

    #[derive(Default)]
    struct Names(Mutex<Vec<String>>);

    impl MetricSink for Names {
        fn name(&self) -> &str {
            "names"
        }

        async fn send(&self, record: &MetricRecord) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(record.name.clone());
            Ok(())
        }
    }

    let core = core_config(dir.path(), "ce_traffic", "pattern", "ce_traffic.log", 2003);
    let config = PipelineConfig::from_core(&core);
    assert_eq!(config.source, SourceKind::Pattern);

    let mut pipeline = TailPipelineBuilder::new()
        .config(config)
        .sink(Names::default())
        .build()
        .await
        .expect("pipeline builds");

    let report = pipeline.run_cycle().await;
    assert_eq!(report.candidates, 3);

    // "CE_TRAFFIC.LOG" < "Ce_Traffic.Log" < "ce_traffic.log" (바이트 순)
    assert_eq!(
        *pipeline.sink().0.lock().unwrap(),
        vec!["in_a".to_owned(), "in_c".to_owned(), "in_b".to_owned()]
    );
}
