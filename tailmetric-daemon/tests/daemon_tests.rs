//! End-to-end daemon tests against a local TCP collector.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailmetric_core::config::TailmetricConfig;
use tailmetric_daemon::orchestrator::Daemon;

/// Accept connections and forward every received line.
async fn spawn_line_collector() -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(line);
                }
            });
        }
    });

    (port, rx)
}

fn config(dir: &Path, port: u16, pid_file: &str) -> TailmetricConfig {
    let toml = format!(
        r#"
[general]
pid_file = "{pid_file}"

[collector]
file_dir = "{dir}"
file_pattern = "throughput.log"
index_path = "{index}"
checking_interval_secs = 1

[metric]
name = "throughput"

[sender]
kind = "socket"
address = "127.0.0.1"
port = {port}
timeout_secs = 2
"#,
        dir = dir.display(),
        index = dir.join("state").join("file-index.properties").display(),
    );
    TailmetricConfig::parse(&toml).unwrap()
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("collector should receive a line")
        .expect("collector channel open")
}

#[tokio::test]
async fn run_once_delivers_new_lines_and_persists_position() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("throughput.log"),
        "1420070400:10\n1420070460:12.5\n",
    )
    .unwrap();
    let (port, mut rx) = spawn_line_collector().await;

    let pid_file = dir.path().join("run").join("tailmetric.pid");
    let mut daemon = Daemon::build_from_config(config(dir.path(), port, &pid_file.display().to_string()))
        .await
        .unwrap();

    let report = daemon.run_once().await.unwrap();
    assert_eq!(report.metrics_sent, 2);
    assert_eq!(recv(&mut rx).await, "throughput 10.0 1420070400");
    assert_eq!(recv(&mut rx).await, "throughput 12.5 1420070460");
    assert!(!pid_file.exists(), "PID file should be removed after the cycle");

    let index = std::fs::read_to_string(dir.path().join("state").join("file-index.properties")).unwrap();
    assert!(index.contains("last.analysed.line.number=2"));
}

#[tokio::test]
async fn restart_resumes_after_committed_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("throughput.log");
    std::fs::write(&log, "1420070400:1\n").unwrap();
    let (port, mut rx) = spawn_line_collector().await;

    {
        let mut daemon = Daemon::build_from_config(config(dir.path(), port, "")).await.unwrap();
        daemon.run_once().await.unwrap();
    }
    assert_eq!(recv(&mut rx).await, "throughput 1.0 1420070400");

    std::fs::write(&log, "1420070400:1\n1420070401:2\n").unwrap();

    let mut daemon = Daemon::build_from_config(config(dir.path(), port, "")).await.unwrap();
    let report = daemon.run_once().await.unwrap();
    assert_eq!(report.metrics_sent, 1);
    assert_eq!(recv(&mut rx).await, "throughput 2.0 1420070401");
}

#[tokio::test]
async fn run_until_picks_up_appended_lines_and_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("throughput.log");
    std::fs::write(&log, "1420070400:1\n").unwrap();
    let (port, mut rx) = spawn_line_collector().await;

    let pid_file = dir.path().join("tailmetric.pid");
    let mut daemon = Daemon::build_from_config(config(dir.path(), port, &pid_file.display().to_string()))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let driver = {
        let token = token.clone();
        let pid_file = pid_file.clone();
        async move {
            assert_eq!(recv(&mut rx).await, "throughput 1.0 1420070400");
            assert!(pid_file.exists(), "PID file should exist while running");

            std::fs::write(&log, "1420070400:1\n1420070401:2\n").unwrap();
            assert_eq!(recv(&mut rx).await, "throughput 2.0 1420070401");
            token.cancel();
        }
    };

    let (cycles, ()) = tokio::join!(daemon.run_until(token), driver);
    assert!(cycles.unwrap() >= 2);
    assert!(!pid_file.exists());
    assert_eq!(daemon.pipeline().position().last_line, 2);
}

#[tokio::test]
async fn second_instance_is_refused_by_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("throughput.log"), "").unwrap();
    let pid_file = dir.path().join("tailmetric.pid");
    std::fs::write(&pid_file, "4242\n").unwrap();

    let mut daemon = Daemon::build_from_config(config(dir.path(), 2003, &pid_file.display().to_string()))
        .await
        .unwrap();

    let err = daemon.run_once().await.unwrap_err().to_string();
    assert!(err.contains("4242"), "got: {err}");
}

#[tokio::test]
async fn invalid_config_is_rejected_before_build() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), 2003, "");
    config.collector.checking_interval_secs = 0;

    let err = Daemon::build_from_config(config).await.err().unwrap().to_string();
    assert!(err.contains("checking_interval_secs"), "got: {err}");
}
