//! 탐지 모델.
//!
//! 서버 추론 결과로 받은 도로 손상 탐지 레코드와 심각도 등급.
//! 필드 이름은 서버 와이어 포맷(`frame_index`, `class_name`, ...)과 정확히 일치한다.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 심각도 등급
///
/// `Low < Medium < High < Critical` 의 전순서. 알 수 없는 값은 `Unknown`(순위 0)으로 흡수한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// 서버가 보낸 미지의 등급
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 알려진 등급 목록 (높은 순)
    pub const KNOWN: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// 정렬용 순위 (Unknown=0, Low=1 ... Critical=4)
    pub fn rank(self) -> u8 {
        match self {
            Severity::Unknown => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    /// 표시용 라벨
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Unknown => "Unknown",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// 라벨 파싱 (대소문자 무시). 미지의 값은 `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::parse(&label))
    }
}

/// 빈 CSV 셀이나 JSON `null`을 기본값으로 읽는다
fn blank_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 도로 손상 탐지 1건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 원본 영상 내 프레임 순번 (영상 1개 안에서 고유)
    pub frame_index: u64,
    /// 캡처 시각 (ISO-8601 또는 로케일 포맷 — 코어는 정렬 시에만 해석)
    #[serde(default)]
    pub timestamp: String,
    /// WGS-84 위도 (GPS 미수신 시 None 또는 0)
    #[serde(default)]
    pub latitude: Option<f64>,
    /// WGS-84 경도
    #[serde(default)]
    pub longitude: Option<f64>,
    /// 모델 클래스 ID
    #[serde(default)]
    pub class_id: Option<u32>,
    /// 손상 유형 (Pothole, Crack, ... — 열린 문자열)
    pub class_name: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub x1: f64,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub y1: f64,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub x2: f64,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub y2: f64,
    /// 바운딩 박스 면적 (픽셀)
    #[serde(default, deserialize_with = "blank_as_default")]
    pub bbox_area_px: u64,
    /// 프레임 너비
    #[serde(default)]
    pub frame_w: Option<u32>,
    /// 프레임 높이
    #[serde(default)]
    pub frame_h: Option<u32>,
    /// 심각도
    pub severity: Severity,
}

impl Detection {
    /// 지도에 표시 가능한 좌표 반환
    ///
    /// 두 좌표가 모두 있고, 유한하며, 0이 아닐 때만 Some.
    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng))
                if lat.is_finite() && lng.is_finite() && lat != 0.0 && lng != 0.0 =>
            {
                Some((lat, lng))
            }
            _ => None,
        }
    }

    /// 타임스탬프를 UTC 시각으로 해석
    ///
    /// RFC 3339, 그리고 `YYYY-MM-DD HH:MM:SS[.f]` / `YYYY-MM-DDTHH:MM:SS[.f]` (UTC 간주)를 지원한다.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
