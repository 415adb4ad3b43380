//! 업로드 → 폴링 → 완료 통합 테스트
//!
//! Mock 서비스와 실제 HTTP 클라이언트, 오케스트레이터, 저장소, 조회 엔진을 연결한다.


use mock_server::MockServer;
use roadscan_core::models::detection::Severity;
use roadscan_core::models::session::UploadState;
use roadscan_core::models::video::VideoFile;
use roadscan_core::ports::detection_service::DetectionService;
use roadscan_core::query::{aggregate, query, QueryOptions, SeverityFilter, SortField, SortOrder};
use roadscan_core::store::DetectionStore;
use roadscan_core::views::{alert_candidates, map_points};
use roadscan_network::http_client::HttpDetectionClient;
use roadscan_session::orchestrator::UploadOrchestrator;
use std::sync::Arc;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(20);

fn video_in(dir: &tempfile::TempDir) -> VideoFile {
    let path = dir.path().join("road.mp4");
    std::fs::write(&path, vec![7u8; 64 * 1024]).unwrap();
    VideoFile::open(&path, &["mp4".to_string()]).unwrap()
}

fn client_for(server: &MockServer) -> Arc<HttpDetectionClient> {
    Arc::new(
        HttpDetectionClient::new(server.url(), Duration::from_secs(5))
            .unwrap()
            .with_chunk_size(8 * 1024)
            .with_retry_delay(Duration::from_millis(5)),
    )
}

#[tokio::test]
async fn upload_polls_until_complete() {
    let server = MockServer::start(3).await;
    let dir = tempfile::TempDir::new().unwrap();

    let store = Arc::new(DetectionStore::new());
    let orchestrator = UploadOrchestrator::new(client_for(&server), store.clone(), POLL);

    let id = orchestrator.select(video_in(&dir));
    orchestrator.begin(id).unwrap();

    let session = tokio::time::timeout(Duration::from_secs(10), orchestrator.wait_until_settled())
        .await
        .expect("세션이 끝나지 않음");

    assert_eq!(session.state, UploadState::Complete, "세션: {session:?}");
    assert_eq!(session.progress_percent, 100);
    assert_eq!(store.detections().len(), 3);
    // 처리 중 3회 + 완료 1회
    assert_eq!(server.polls_after_upload(), 4);

    let stats = store.latest_stats().expect("통계 병합 안 됨");
    assert_eq!(stats.detection_count, 3);

    let uploads = server.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].content_type.starts_with("multipart/form-data"));
    assert!(uploads[0].has_video_field);
    assert!(uploads[0].file_name_seen);
    assert!(uploads[0].body_len > 64 * 1024);

    assert!(!orchestrator.coordinator().is_running());
}

#[tokio::test]
async fn completed_results_feed_query_engine() {
    let server = MockServer::start(0).await;
    let dir = tempfile::TempDir::new().unwrap();

    let store = Arc::new(DetectionStore::new());
    let orchestrator = UploadOrchestrator::new(client_for(&server), store.clone(), POLL);
    let id = orchestrator.select(video_in(&dir));
    orchestrator.begin(id).unwrap();
    let session = tokio::time::timeout(Duration::from_secs(10), orchestrator.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(session.state, UploadState::Complete);

    let detections = store.detections();

    let critical = query(
        &detections,
        &QueryOptions {
            severity_filter: SeverityFilter::Only(Severity::Critical),
            ..Default::default()
        },
    );
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].class_name, "Pothole");

    let by_severity = query(
        &detections,
        &QueryOptions {
            sort_field: SortField::Severity,
            sort_order: SortOrder::Desc,
            ..Default::default()
        },
    );
    let order: Vec<Severity> = by_severity.iter().map(|d| d.severity).collect();
    assert_eq!(order, vec![Severity::Critical, Severity::High, Severity::Low]);

    let summary = aggregate(&detections);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.critical_count, 1);
    assert_eq!(summary.high_count, 1);
    assert_eq!(summary.total_area_px, 5_600);

    // GPS 없는 Crack은 지도에서 제외
    assert_eq!(map_points(&detections).len(), 2);
    assert_eq!(alert_candidates(&detections).len(), 2);
}

#[tokio::test]
async fn server_rejection_fails_session() {
    let server = MockServer::start(1).await;
    server.fail_uploads_with(500);
    let dir = tempfile::TempDir::new().unwrap();

    let store = Arc::new(DetectionStore::new());
    let orchestrator = UploadOrchestrator::new(client_for(&server), store.clone(), POLL);
    let id = orchestrator.select(video_in(&dir));
    orchestrator.begin(id).unwrap();

    let session = tokio::time::timeout(Duration::from_secs(10), orchestrator.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(session.state, UploadState::Failed);
    assert!(session.error.unwrap().contains("500"));
    assert!(store.detections().is_empty());

    // 실패 후 재선택으로 복구
    let retry = orchestrator.select(video_in(&dir));
    assert_eq!(store.session().state, UploadState::Selected);
    assert!(store.session().is_current(retry));
}

#[tokio::test]
async fn reselect_during_processing_stops_old_polling() {
    // 사실상 끝나지 않는 처리
    let server = MockServer::start(usize::MAX).await;
    let dir = tempfile::TempDir::new().unwrap();

    let store = Arc::new(DetectionStore::new());
    let orchestrator = UploadOrchestrator::new(client_for(&server), store.clone(), POLL);
    let first = orchestrator.select(video_in(&dir));
    orchestrator.begin(first).unwrap();

    // 폴링이 몇 번 돌 때까지 대기
    tokio::time::timeout(Duration::from_secs(10), async {
        while server.status_polls() < 2 {
            tokio::time::sleep(POLL).await;
        }
    })
    .await
    .unwrap();

    let second = orchestrator.select(video_in(&dir));
    let polls = server.status_polls();
    tokio::time::sleep(POLL * 10).await;

    // 진행 중이던 틱 하나까지만 허용
    assert!(server.status_polls() <= polls + 1);
    let snapshot = store.snapshot();
    assert!(snapshot.session.is_current(second));
    assert_eq!(snapshot.session.state, UploadState::Selected);
    assert!(snapshot.stats.is_none());
}

#[tokio::test]
async fn report_and_export_after_processing() {
    let server = MockServer::start(0).await;
    let client = client_for(&server);

    // 업로드 전에는 리포트 없음
    let report = client.last_report().await.unwrap();
    assert!(!report.has_report());

    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(DetectionStore::new());
    let orchestrator = UploadOrchestrator::new(client.clone(), store, POLL);
    let id = orchestrator.select(video_in(&dir));
    orchestrator.begin(id).unwrap();
    tokio::time::timeout(Duration::from_secs(10), orchestrator.wait_until_settled())
        .await
        .unwrap();

    let report = client.last_report().await.unwrap();
    assert!(report.has_report());
    assert_eq!(report.total_detections, Some(3));
    assert_eq!(report.file_name(), Some("run 1.csv"));

    // 리포트 파일은 외부 소비자가 URL로 받는다
    let url = client.report_url("run 1.csv").unwrap();
    assert!(url.ends_with("/reports/run%201.csv"));
    let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
    assert!(body.contains("Pothole"));

    let csv = client.export_csv().await.unwrap();
    assert_eq!(csv, mock_server::DEFAULT_CSV.as_bytes());
}

#[tokio::test]
async fn ping_round_trip() {
    let server = MockServer::start(0).await;
    let value = client_for(&server).ping().await.unwrap();
    assert_eq!(value["message"], "pong");
}
