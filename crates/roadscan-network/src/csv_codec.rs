//! 탐지 CSV 디코딩.
//!
//! `/export_csv` 응답(및 같은 형식의 로컬 파일)을 `Detection` 목록으로 변환한다.
//! 헤더 이름은 와이어 필드 이름과 같으며, 모르는 열은 무시한다.

use roadscan_core::error::CoreError;
use roadscan_core::models::detection::Detection;
use tracing::debug;

/// CSV 바이트를 탐지 목록으로 디코딩
///
/// 서버가 보낸 행 순서를 그대로 유지한다. 빈 본문은 빈 목록.
pub fn parse_detections(bytes: &[u8]) -> Result<Vec<Detection>, CoreError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let mut detections = Vec::new();
    for (row, record) in reader.deserialize::<Detection>().enumerate() {
        let detection = record
            .map_err(|e| CoreError::Decode(format!("탐지 CSV {}행 파싱 실패: {e}", row + 1)))?;
        detections.push(detection);
    }

    debug!("탐지 CSV 디코딩: {}건", detections.len());
    Ok(detections)
}

/// 로컬 CSV 파일에서 탐지 목록 로드
pub fn read_detections_file(path: &std::path::Path) -> Result<Vec<Detection>, CoreError> {
    let bytes = std::fs::read(path)?;
    parse_detections(&bytes)
}
