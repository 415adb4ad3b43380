//! 원격 탐지 서비스 포트.
//!
//! 구현: `roadscan-network` crate (reqwest)

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CoreError;
use crate::models::detection::Detection;
use crate::models::processing::{LastReport, ProcessingStats, ProcessingStatus, UploadAck};
use crate::models::video::VideoFile;

/// 업로드 진행률 콜백 (0 ~ 100)
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// 원격 탐지 서비스 게이트웨이
///
/// 같은 폴링 틱에서 호출한 `processing_status`와 `detection_count`는 서로 독립된 읽기이며,
/// 최대 한 폴링 주기만큼 서로 어긋날 수 있다.
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// 생존 확인 (`GET /ping`, 응답 형식은 구현 정의)
    async fn ping(&self) -> Result<serde_json::Value, CoreError>;

    /// 영상 업로드
    ///
    /// `on_progress`는 0회 이상, 단조 비감소 백분율로 호출된다.
    /// 성공 시 마지막 호출은 100이다. 네트워크/5xx 실패는 `Transport`/`Server`.
    async fn upload(
        &self,
        file: VideoFile,
        on_progress: ProgressCallback,
    ) -> Result<UploadAck, CoreError>;

    /// 처리 완료 여부 조회
    async fn processing_status(&self) -> Result<ProcessingStatus, CoreError>;

    /// 중간/집계 통계 조회
    async fn detection_count(&self) -> Result<ProcessingStats, CoreError>;

    /// 최근 리포트 요약 조회
    async fn last_report(&self) -> Result<LastReport, CoreError>;

    /// 현재 탐지 결과 CSV 원본
    async fn export_csv(&self) -> Result<Vec<u8>, CoreError>;

    /// 처리 완료 후 탐지 결과 전체 조회
    async fn fetch_detections(&self) -> Result<Vec<Detection>, CoreError>;
}
