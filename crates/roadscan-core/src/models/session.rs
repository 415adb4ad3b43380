//! 업로드 세션 모델.
//!
//! 영상 1개의 선택 → 업로드 → 처리 → 완료 라이프사이클 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 클라이언트 측 세션 식별자
///
/// 파일이 선택될 때마다 새로 발급되며, 대체된 세션에서 온 쓰기를 걸러내는 데 쓰인다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// 새 세션 ID 발급 (UUIDv4)
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess_{}", self.0.simple())
    }
}

/// 업로드 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// 선택된 파일 없음
    Idle,
    /// 파일 선택됨, 업로드 대기
    Selected,
    /// 업로드 진행 중
    Uploading,
    /// 서버 처리 중 (폴링 활성)
    Processing,
    /// 처리 완료, 결과 반영됨
    Complete,
    /// 실패 (새 파일 선택으로 복구)
    Failed,
}

impl UploadState {
    /// 업로드나 폴링이 진행 중인 상태인지
    pub fn is_in_flight(self) -> bool {
        matches!(self, UploadState::Uploading | UploadState::Processing)
    }

    /// 종료 상태인지
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Complete | UploadState::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadState::Idle => "idle",
            UploadState::Selected => "selected",
            UploadState::Uploading => "uploading",
            UploadState::Processing => "processing",
            UploadState::Complete => "complete",
            UploadState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// 업로드 세션 스냅샷
///
/// 파일 핸들 자체는 오케스트레이터가 소유하고, 여기에는 표시용 이름만 남는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    /// 세션 ID (Idle이면 None)
    pub id: Option<SessionId>,
    /// 현재 상태
    pub state: UploadState,
    /// 업로드 진행률 (0 ~ 100)
    pub progress_percent: u8,
    /// 선택된 파일 이름
    pub file_name: Option<String>,
    /// 실패 사유
    pub error: Option<String>,
    /// 세션 생성 시각
    pub selected_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// 빈(Idle) 세션
    pub fn idle() -> Self {
        Self {
            id: None,
            state: UploadState::Idle,
            progress_percent: 0,
            file_name: None,
            error: None,
            selected_at: None,
        }
    }

    /// 새 파일이 선택된 세션 (진행률 0으로 리셋)
    pub fn selected(id: SessionId, file_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            state: UploadState::Selected,
            progress_percent: 0,
            file_name: Some(file_name.into()),
            error: None,
            selected_at: Some(Utc::now()),
        }
    }

    /// 주어진 세션 ID가 현재 세션인지
    pub fn is_current(&self, id: SessionId) -> bool {
        self.id == Some(id)
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// 세션 부분 갱신
///
/// `None` 필드는 기존 값을 유지한다.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub state: Option<UploadState>,
    pub progress_percent: Option<u8>,
    pub file_name: Option<String>,
    pub error: Option<Option<String>>,
}

impl SessionPatch {
    /// 세션에 패치 적용. 값이 실제로 바뀌었으면 true.
    pub fn apply(self, session: &mut UploadSession) -> bool {
        let before = session.clone();
        if let Some(state) = self.state {
            session.state = state;
        }
        if let Some(progress) = self.progress_percent {
            session.progress_percent = progress.min(100);
        }
        if let Some(name) = self.file_name {
            session.file_name = Some(name);
        }
        if let Some(error) = self.error {
            session.error = error;
        }
        *session != before
    }
}
