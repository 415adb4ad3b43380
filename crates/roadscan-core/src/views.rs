//! 뷰 투영.
//!
//! 지도 마커, 지도 중심, 경보 후보처럼 화면 컴포넌트가 탐지 목록에서 뽑아 쓰는 부분집합.
//! 타일/차트 렌더링 자체는 외부 협력자의 몫이다.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::detection::{Detection, Severity};

/// GPS가 없을 때 지도 중심 (뉴욕 시청 부근)
pub const FALLBACK_MAP_CENTER: (f64, f64) = (40.7128, -74.0060);

/// 지도 마커 1개
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub frame_index: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub class_name: String,
    pub severity: Severity,
    pub confidence: f64,
}

/// 좌표가 있는 탐지만 마커로 변환
pub fn map_points(detections: &[Detection]) -> Vec<MapPoint> {
    detections
        .iter()
        .filter_map(|d| {
            d.location().map(|(latitude, longitude)| MapPoint {
                frame_index: d.frame_index,
                latitude,
                longitude,
                class_name: d.class_name.clone(),
                severity: d.severity,
                confidence: d.confidence,
            })
        })
        .collect()
}

/// 지도 초기 중심
///
/// 첫 번째 좌표 보유 탐지, 없으면 [`FALLBACK_MAP_CENTER`].
pub fn map_center(detections: &[Detection]) -> (f64, f64) {
    detections
        .iter()
        .find_map(Detection::location)
        .unwrap_or(FALLBACK_MAP_CENTER)
}

/// 경보 대상 (High/Critical) — 저장소 순서 유지
pub fn alert_candidates(detections: &[Detection]) -> Vec<&Detection> {
    detections
        .iter()
        .filter(|d| d.severity >= Severity::High)
        .collect()
}

/// 세션 동안 발송한 경보 기록
///
/// [`AlertBook::dispatch`]는 저장소의 탐지 목록이 교체된 것을 감지하면 기록을 비운다.
#[derive(Debug, Default)]
pub struct AlertBook {
    sent: HashSet<u64>,
    /// 마지막으로 본 탐지 목록
    source: Option<Arc<Vec<Detection>>>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sent(&self, frame_index: u64) -> bool {
        self.sent.contains(&frame_index)
    }

    /// 아직 발송하지 않은 경보 대상
    pub fn pending<'a>(&self, detections: &'a [Detection]) -> Vec<&'a Detection> {
        alert_candidates(detections)
            .into_iter()
            .filter(|d| !self.is_sent(d.frame_index))
            .collect()
    }

    /// 발송 처리된 누적 건수
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// 새 경보를 뽑아 발송 처리
    ///
    /// 저장소 스냅샷의 목록이 이전과 다른 `Arc`면 교체된 것으로 보고 기록을 먼저 비운다.
    pub fn dispatch<'a>(&mut self, detections: &'a Arc<Vec<Detection>>) -> Vec<&'a Detection> {
        let replaced = !self
            .source
            .as_ref()
            .is_some_and(|seen| Arc::ptr_eq(seen, detections));
        if replaced {
            self.reset();
            self.source = Some(detections.clone());
        }

        let fresh = self.pending(detections);
        for d in &fresh {
            self.sent.insert(d.frame_index);
        }
        fresh
    }

    pub fn reset(&mut self) {
        self.sent.clear();
    }
}
