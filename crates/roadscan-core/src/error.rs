//! RoadScan 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 타입을 그대로 반환하거나 `#[from] CoreError`로 래핑한다.

use thiserror::Error;

/// 코어 레이어 에러.
///
/// 파일 검증, 전송, 서버 응답, 디코딩, 설정 등 세션 단위로 복구 가능한 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 필드 유효성 검증 실패 (잘못된/누락된 파일 — 서버로 전송되지 않음)
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 전송 에러 (연결 실패, 타임아웃, 본문 읽기 실패)
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 서버가 정상 형식의 에러 응답을 반환함
    #[error("서버 에러 ({status}): {message}")]
    Server {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        message: String,
    },

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV 등 비JSON 페이로드 디코딩 실패
    #[error("디코딩 에러: {0}")]
    Decode(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 호출 계약 위반 (잘못된 상태에서의 전이 요청)
    #[error("호출 계약 위반: {0}")]
    ContractViolation(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 유효성 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 다음 시도에서 회복될 수 있는 에러인지 판별
    ///
    /// 전송 에러 전체, 그리고 429/5xx 서버 응답이 해당된다.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
