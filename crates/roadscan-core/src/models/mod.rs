//! RoadScan 도메인 모델.
//!
//! 탐지 서비스와 주고받는 데이터 구조체와 클라이언트 세션 상태를 정의한다.
//! 와이어 경계를 넘는 모델은 모두 `serde` Serialize/Deserialize를 구현한다.

pub mod detection;
pub mod processing;
pub mod session;
pub mod video;
