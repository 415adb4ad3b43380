//! # roadscan-session
//!
//! 영상 1개의 업로드 → 처리 → 완료 라이프사이클 구동.
//!
//! - [`machine`] — `UploadSession` 상태 전이 (저장소 위의 순수 FSM)
//! - [`polling`] — 처리 중 상태/통계 주기 조회
//! - [`orchestrator`] — 파일 소유, 업로드 태스크, 폴링 인계, 세션 교체 시 취소

pub mod machine;
pub mod orchestrator;
pub mod polling;

#[cfg(test)]
pub(crate) mod testing;
