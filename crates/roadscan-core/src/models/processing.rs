//! 처리 상태 / 통계 / 리포트 모델.
//!
//! 탐지 서비스의 `/processing_status`, `/detection_count`, `/last_report`, `/upload` 응답 형식.

use serde::{Deserialize, Serialize};

/// `/processing_status` 응답
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// 서버가 아직 추론 중인지
    pub processing: bool,
}

/// `/detection_count` 응답 — 중간/집계 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// 누적 탐지 수
    #[serde(rename = "detections", default)]
    pub detection_count: u64,
    /// 누적 바운딩 박스 면적 (픽셀)
    #[serde(default)]
    pub total_area: f64,
    /// 평균 신뢰도 (탐지가 없으면 None)
    #[serde(default)]
    pub avg_confidence: Option<f64>,
}

/// `/last_report` 응답
///
/// `csv_path`가 없으면 "아직 리포트 없음"이며 에러가 아니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastReport {
    #[serde(default)]
    pub csv_path: Option<String>,
    #[serde(default)]
    pub total_detections: Option<u64>,
    #[serde(default)]
    pub total_area: Option<f64>,
    #[serde(default)]
    pub avg_confidence: Option<f64>,
}

impl LastReport {
    /// 리포트가 생성되었는지
    pub fn has_report(&self) -> bool {
        self.csv_path.is_some()
    }

    /// 리포트 파일 이름 (`/reports/{filename}` 조회용)
    pub fn file_name(&self) -> Option<&str> {
        self.csv_path
            .as_deref()
            .and_then(|p| p.rsplit(&['/', '\\'][..]).next())
            .filter(|name| !name.is_empty())
    }
}

/// `/upload` 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadAck {
    /// 서버 메시지
    #[serde(default)]
    pub message: Option<String>,
    /// 그 외 필드 (구현 정의)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
