//! 업로드 세션 상태 머신.
//!
//! ```text
//! Idle --select--> Selected --begin--> Uploading --progress(100)--> Processing
//! Uploading --전송 실패--> Failed        Processing --완료--> Complete
//! Processing --치명적 폴링 실패--> Failed    (모든 상태) --select--> Selected
//! ```
//!
//! 모든 전이는 [`DetectionStore::mutate`] 한 번 안에서 일어나고 [`SessionId`]로 보호된다.
//! 대체된 세션 ID로 들어온 전이는 저장소를 건드리지 않는다.

use std::sync::Arc;
use tracing::{debug, info, warn};

use roadscan_core::error::CoreError;
use roadscan_core::models::detection::Detection;
use roadscan_core::models::session::{SessionId, UploadSession, UploadState};
use roadscan_core::store::DetectionStore;

/// 진행률 이벤트 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// 진행률 기록 (같은 값 포함)
    Recorded,
    /// 이전 값보다 낮아 무시 (역행 방지)
    Clamped,
    /// 100 도달 — Processing으로 인계됨. 세션당 정확히 한 번.
    HandedOff,
    /// 현재 세션이 아니거나 Uploading 상태가 아님
    Ignored,
}

/// 업로드 세션 상태 머신
#[derive(Clone)]
pub struct UploadMachine {
    store: Arc<DetectionStore>,
}

impl UploadMachine {
    pub fn new(store: Arc<DetectionStore>) -> Self {
        Self { store }
    }

    /// 공유 저장소
    pub fn store(&self) -> &Arc<DetectionStore> {
        &self.store
    }

    /// 현재 세션 상태
    pub fn state(&self) -> UploadState {
        self.store.session().state
    }

    /// 새 파일 선택 — 어떤 상태에서든 Selected로, 진행률/에러/통계 초기화
    ///
    /// 파일 형식 검증은 호출자 책임이다. 진행 중인 작업의 취소는 오케스트레이터가 한다.
    pub fn select(&self, file_name: &str) -> SessionId {
        let id = SessionId::new();
        self.store.mutate(|snapshot| {
            snapshot.session = UploadSession::selected(id, file_name);
            snapshot.stats = None;
            true
        });
        info!("파일 선택: {file_name} ({id})");
        id
    }

    /// 세션을 Idle로 되돌림 (화면 이탈)
    pub fn reset(&self) {
        self.store.mutate(|snapshot| {
            if snapshot.session == UploadSession::idle() {
                return false;
            }
            snapshot.session = UploadSession::idle();
            true
        });
    }

    /// 업로드 시작 — Selected에서만 허용
    pub fn begin(&self, id: SessionId) -> Result<(), CoreError> {
        let mut result = Ok(());
        self.store.mutate(|snapshot| {
            let session = &mut snapshot.session;
            if !session.is_current(id) {
                result = Err(CoreError::ContractViolation(format!(
                    "대체된 세션에서 begin 호출: {id}"
                )));
                return false;
            }
            if session.state != UploadState::Selected {
                result = Err(CoreError::ContractViolation(format!(
                    "begin은 selected 상태에서만 가능 (현재: {})",
                    session.state
                )));
                return false;
            }
            session.state = UploadState::Uploading;
            session.progress_percent = 0;
            session.error = None;
            true
        });

        match &result {
            Ok(()) => debug!("업로드 시작: {id}"),
            Err(e) => warn!("{e}"),
        }
        result
    }

    /// 업로드 진행률 반영
    ///
    /// 역행 값은 무시하고, 100 도달 시 Processing으로 한 번만 인계한다.
    pub fn progress(&self, id: SessionId, percent: u8) -> ProgressOutcome {
        let percent = percent.min(100);
        let mut outcome = ProgressOutcome::Ignored;
        self.store.mutate(|snapshot| {
            let session = &mut snapshot.session;
            if !session.is_current(id) || session.state != UploadState::Uploading {
                return false;
            }
            if percent < session.progress_percent {
                outcome = ProgressOutcome::Clamped;
                return false;
            }
            if percent == 100 {
                session.progress_percent = 100;
                session.state = UploadState::Processing;
                outcome = ProgressOutcome::HandedOff;
                return true;
            }
            outcome = ProgressOutcome::Recorded;
            if percent == session.progress_percent {
                return false;
            }
            session.progress_percent = percent;
            true
        });

        if outcome == ProgressOutcome::HandedOff {
            info!("업로드 완료, 서버 처리 대기: {id}");
        }
        outcome
    }

    /// 세션 실패 처리
    ///
    /// 진행 중(Selected/Uploading/Processing)인 현재 세션에만 적용된다.
    pub fn fail(&self, id: SessionId, reason: &str) -> bool {
        let changed = self.store.mutate(|snapshot| {
            let session = &mut snapshot.session;
            if !session.is_current(id)
                || session.state.is_terminal()
                || session.state == UploadState::Idle
            {
                return false;
            }
            session.state = UploadState::Failed;
            session.error = Some(reason.to_string());
            true
        });
        if changed {
            warn!("세션 실패: {id}: {reason}");
        }
        changed
    }

    /// 처리 완료 — 탐지 목록 교체와 Complete 전이를 한 번에
    pub fn complete(&self, id: SessionId, detections: Vec<Detection>) -> bool {
        let count = detections.len();
        let changed = self.store.mutate(|snapshot| {
            if !snapshot.session.is_current(id)
                || snapshot.session.state != UploadState::Processing
            {
                return false;
            }
            snapshot.detections = Arc::new(detections);
            snapshot.session.state = UploadState::Complete;
            snapshot.session.progress_percent = 100;
            snapshot.session.error = None;
            true
        });
        if changed {
            info!("처리 완료: {id}, 탐지 {count}건");
        }
        changed
    }
}
