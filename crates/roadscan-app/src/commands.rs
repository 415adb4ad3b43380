//! 서브커맨드 실행.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use roadscan_core::config::AppConfig;
use roadscan_core::models::detection::Detection;
use roadscan_core::models::session::UploadState;
use roadscan_core::models::video::VideoFile;
use roadscan_core::ports::detection_service::DetectionService;
use roadscan_core::query::{aggregate, query, QueryOptions};
use roadscan_core::store::DetectionStore;
use roadscan_core::views::{alert_candidates, AlertBook};
use roadscan_network::csv_codec::read_detections_file;
use roadscan_network::http_client::HttpDetectionClient;
use roadscan_session::orchestrator::UploadOrchestrator;

use crate::lifecycle::LifecycleManager;
use crate::render;

/// 생존 확인
pub async fn ping(client: &HttpDetectionClient) -> Result<()> {
    let value = client
        .ping()
        .await
        .with_context(|| format!("탐지 서비스 연결 실패: {}", client.base_url()))?;
    println!("✅ {} 응답: {value}", client.base_url());
    Ok(())
}

/// 영상 업로드 → 처리 대기 → 결과 요약
pub async fn upload(
    client: Arc<HttpDetectionClient>,
    config: &AppConfig,
    file: &Path,
) -> Result<()> {
    // 드롭존 경계 — 여기서 거부되면 서버로 보내지 않는다
    let video = VideoFile::open(file, &config.upload.accepted_extensions)?;
    println!(
        "📁 {} ({:.1} MB, {})",
        video.file_name,
        video.size_bytes as f64 / (1024.0 * 1024.0),
        video.mime_type
    );
    println!("🎥 실시간 프레임: {}", client.video_feed_url());

    let store = Arc::new(DetectionStore::new());
    let service: Arc<dyn DetectionService> = client.clone();
    let orchestrator = UploadOrchestrator::new(service, store.clone(), config.poll_interval())
        .with_poll_fault_limit(config.polling.max_consecutive_failures);

    let lifecycle = Arc::new(LifecycleManager::new());
    let mut shutdown_rx = lifecycle.subscribe();
    let signal_task = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.wait_for_signal().await })
    };

    let mut rx = store.subscribe();
    let id = orchestrator.select(video);
    orchestrator.begin(id)?;

    let mut alert_book = AlertBook::new();
    let mut last_line = String::new();
    let outcome = loop {
        let snapshot = rx.borrow_and_update().clone();
        let line = render::session_line(&snapshot.session, snapshot.stats.as_ref());
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        {
            let fresh = alert_book.dispatch(&snapshot.detections);
            if !fresh.is_empty() {
                info!("경보 {}건 발송", fresh.len());
                println!("{}", render::alerts(&fresh, Some(alert_book.sent_count())));
            }
        }
        if snapshot.session.state.is_terminal() {
            break Some(snapshot);
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break None;
                }
            }
            _ = shutdown_rx.changed() => {
                println!("⏹  업로드 세션 중단");
                orchestrator.teardown();
                break None;
            }
        }
    };
    signal_task.abort();

    let Some(snapshot) = outcome else {
        return Ok(());
    };

    match snapshot.session.state {
        UploadState::Complete => {
            println!();
            println!(
                "{}",
                render::dashboard(&aggregate(&snapshot.detections), &snapshot.detections)
            );
            Ok(())
        }
        _ => bail!(
            "업로드 세션 실패: {}",
            snapshot.session.error.unwrap_or_else(|| "알 수 없는 오류".to_string())
        ),
    }
}

/// 탐지 결과 로드 — 로컬 CSV 또는 서비스
async fn load_detections(
    client: &HttpDetectionClient,
    input: Option<&Path>,
) -> Result<Vec<Detection>> {
    match input {
        Some(path) => read_detections_file(path)
            .with_context(|| format!("CSV 파일 읽기 실패: {}", path.display())),
        None => client
            .fetch_detections()
            .await
            .context("탐지 결과 조회 실패"),
    }
}

/// 탐지 목록을 저장소에 올림
async fn load_store(client: &HttpDetectionClient, input: Option<&Path>) -> Result<DetectionStore> {
    let store = DetectionStore::new();
    store.replace_detections(load_detections(client, input).await?);
    Ok(store)
}

/// 필터/정렬된 탐지 표
pub async fn results(
    client: &HttpDetectionClient,
    options: &QueryOptions,
    input: Option<&Path>,
) -> Result<()> {
    let store = load_store(client, input).await?;
    let detections = store.detections();
    let rows = query(&detections, options);
    info!("조회: {}건 중 {}건", detections.len(), rows.len());
    println!("{}", render::detection_table(&rows, detections.len()));
    Ok(())
}

/// 집계 대시보드
pub async fn dashboard(client: &HttpDetectionClient, input: Option<&Path>) -> Result<()> {
    let store = load_store(client, input).await?;
    let detections = store.detections();
    println!("{}", render::dashboard(&aggregate(&detections), &detections));
    Ok(())
}

/// High/Critical 경보 목록
///
/// 단발 조회라 발송 기록은 남기지 않는다. 발송 처리는 `upload` 세션이 맡는다.
pub async fn alerts(client: &HttpDetectionClient, input: Option<&Path>) -> Result<()> {
    let store = load_store(client, input).await?;
    let detections = store.detections();
    println!("{}", render::alerts(&alert_candidates(&detections), None));
    Ok(())
}

/// 최근 리포트 요약
pub async fn report(client: &HttpDetectionClient) -> Result<()> {
    let report = client.last_report().await.context("리포트 조회 실패")?;
    let url = match report.file_name() {
        Some(name) => match client.report_url(name) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("리포트 URL 생성 실패: {e}");
                None
            }
        },
        None => None,
    };
    println!("{}", render::report_summary(&report, url.as_deref()));
    Ok(())
}

/// 기본 내보내기 파일 이름
pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "detections_{}.csv",
        chrono::Utc::now().timestamp_millis()
    ))
}

/// CSV 내보내기
pub async fn export(client: &HttpDetectionClient, output: Option<PathBuf>) -> Result<PathBuf> {
    let bytes = client.export_csv().await.context("CSV 내보내기 실패")?;
    let path = output.unwrap_or_else(default_export_path);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("파일 저장 실패: {}", path.display()))?;
    println!("💾 {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}
