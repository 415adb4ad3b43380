//! 탐지 저장소.
//!
//! 현재 탐지 집합과 업로드 세션, 최근 통계를 보관하는 단일 진실 원천.
//! 전역 싱글턴이 아니라 명시적으로 생성해 `Arc`로 각 컴포넌트에 전달한다.
//!
//! 모든 변경은 `tokio::sync::watch` 채널의 락 안에서 하나의 스냅샷 교체로 일어나므로,
//! 읽는 쪽은 반쯤 갱신된 목록이나 세션을 볼 수 없다.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::models::detection::Detection;
use crate::models::processing::ProcessingStats;
use crate::models::session::{SessionId, SessionPatch, UploadSession};

/// 저장소 스냅샷
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// 탐지 목록 (항상 통째로 교체)
    pub detections: Arc<Vec<Detection>>,
    /// 업로드 세션
    pub session: UploadSession,
    /// 마지막으로 병합된 처리 통계
    pub stats: Option<ProcessingStats>,
    /// 유효 변경마다 1씩 증가
    pub revision: u64,
}

/// 탐지 저장소
pub struct DetectionStore {
    tx: watch::Sender<StoreSnapshot>,
}

impl DetectionStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StoreSnapshot::default());
        Self { tx }
    }

    /// 현재 스냅샷 (복제본)
    pub fn snapshot(&self) -> StoreSnapshot {
        self.tx.borrow().clone()
    }

    /// 변경 알림 구독
    ///
    /// 수신기는 변경 후의 완전한 스냅샷만 관찰한다.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    /// 현재 탐지 목록
    pub fn detections(&self) -> Arc<Vec<Detection>> {
        self.tx.borrow().detections.clone()
    }

    /// 탐지 목록 전체 교체
    pub fn replace_detections(&self, detections: Vec<Detection>) {
        let count = detections.len();
        self.mutate(|snapshot| {
            snapshot.detections = Arc::new(detections);
            true
        });
        debug!("탐지 목록 교체: {count}건");
    }

    /// 현재 세션
    pub fn session(&self) -> UploadSession {
        self.tx.borrow().session.clone()
    }

    /// 세션 부분 갱신
    pub fn update_session(&self, patch: SessionPatch) -> bool {
        self.mutate(|snapshot| patch.apply(&mut snapshot.session))
    }

    /// 마지막 처리 통계
    pub fn latest_stats(&self) -> Option<ProcessingStats> {
        self.tx.borrow().stats.clone()
    }

    /// 현재 세션에 대한 통계 병합
    ///
    /// `session_id`가 이미 대체된 세션이면 버리고 false를 반환한다.
    pub fn merge_stats(&self, session_id: SessionId, stats: ProcessingStats) -> bool {
        self.mutate(|snapshot| {
            if !snapshot.session.is_current(session_id) {
                return false;
            }
            if snapshot.stats.as_ref() == Some(&stats) {
                return false;
            }
            snapshot.stats = Some(stats);
            true
        })
    }

    /// 스냅샷 원자적 변경
    ///
    /// 클로저가 true를 반환할 때만 revision을 올리고 구독자에게 알린다.
    /// 세션 상태 전이처럼 여러 필드를 한 번에 바꿔야 하는 호출자를 위해 공개한다.
    pub fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut StoreSnapshot) -> bool,
    {
        self.tx.send_if_modified(|snapshot| {
            let changed = f(snapshot);
            if changed {
                snapshot.revision += 1;
            }
            changed
        })
    }
}

impl Default for DetectionStore {
    fn default() -> Self {
        Self::new()
    }
}
