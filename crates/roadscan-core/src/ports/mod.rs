//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 어댑터 crate(`roadscan-network`)가 구현하며, 세션 계층에서는 `Arc<dyn T>`로 주입받는다.

pub mod detection_service;
