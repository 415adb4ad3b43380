//! 테스트용 스크립트 탐지 서비스.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use roadscan_core::error::CoreError;
use roadscan_core::models::detection::{Detection, Severity};
use roadscan_core::models::processing::{
    LastReport, ProcessingStats, ProcessingStatus, UploadAck,
};
use roadscan_core::models::video::VideoFile;
use roadscan_core::ports::detection_service::{DetectionService, ProgressCallback};

pub(crate) fn detection(frame: u64, class: &str, severity: Severity, confidence: f64) -> Detection {
    Detection {
        frame_index: frame,
        timestamp: String::new(),
        latitude: None,
        longitude: None,
        class_id: None,
        class_name: class.to_string(),
        confidence,
        x1: 0.0,
        y1: 0.0,
        x2: 10.0,
        y2: 10.0,
        bbox_area_px: 100,
        frame_w: None,
        frame_h: None,
        severity,
    }
}

pub(crate) fn video(name: &str) -> VideoFile {
    VideoFile {
        path: PathBuf::from(name),
        file_name: name.to_string(),
        size_bytes: 1,
        mime_type: "video/mp4".to_string(),
    }
}

/// 호출 순서대로 미리 정한 응답을 돌려주는 서비스
///
/// 상태 스크립트가 비면 `processing=true`를 계속 반환한다.
#[derive(Default)]
pub(crate) struct ScriptedService {
    statuses: Mutex<VecDeque<Result<bool, CoreError>>>,
    fetch_failures: Mutex<VecDeque<CoreError>>,
    detections: Mutex<Vec<Detection>>,
    upload_progress: Mutex<Vec<u8>>,
    upload_error: Mutex<Option<CoreError>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    status_calls: AtomicUsize,
    count_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    upload_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<bool, CoreError>>) -> Self {
        *self.statuses.lock() = statuses.into();
        self
    }

    pub fn with_detections(self, detections: Vec<Detection>) -> Self {
        *self.detections.lock() = detections;
        self
    }

    pub fn with_fetch_failures(self, failures: Vec<CoreError>) -> Self {
        *self.fetch_failures.lock() = failures.into();
        self
    }

    pub fn with_upload_progress(self, steps: Vec<u8>) -> Self {
        *self.upload_progress.lock() = steps;
        self
    }

    pub fn with_upload_error(self, error: CoreError) -> Self {
        *self.upload_error.lock() = Some(error);
        self
    }

    /// 업로드가 게이트 신호 전까지 끝나지 않게 함
    pub fn with_upload_gate(self, gate: Arc<Notify>) -> Self {
        *self.upload_gate.lock() = Some(gate);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for ScriptedService {
    async fn ping(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::json!({"message": "pong"}))
    }

    async fn upload(
        &self,
        _file: VideoFile,
        on_progress: ProgressCallback,
    ) -> Result<UploadAck, CoreError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let steps = self.upload_progress.lock().clone();
        for step in steps {
            on_progress(step);
            tokio::task::yield_now().await;
        }

        let gate = self.upload_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.upload_error.lock().take() {
            Some(error) => Err(error),
            None => Ok(UploadAck::default()),
        }
    }

    async fn processing_status(&self) -> Result<ProcessingStatus, CoreError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().pop_front().unwrap_or(Ok(true));
        next.map(|processing| ProcessingStatus { processing })
    }

    async fn detection_count(&self) -> Result<ProcessingStats, CoreError> {
        let call = self.count_calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(ProcessingStats {
            detection_count: call,
            total_area: call as f64 * 100.0,
            avg_confidence: Some(0.5),
        })
    }

    async fn last_report(&self) -> Result<LastReport, CoreError> {
        Ok(LastReport::default())
    }

    async fn export_csv(&self) -> Result<Vec<u8>, CoreError> {
        Ok(Vec::new())
    }

    async fn fetch_detections(&self) -> Result<Vec<Detection>, CoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fetch_failures.lock().pop_front() {
            return Err(error);
        }
        Ok(self.detections.lock().clone())
    }
}
