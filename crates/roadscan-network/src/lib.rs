//! # roadscan-network
//!
//! 탐지 서비스 HTTP 어댑터.
//! `DetectionService` 포트를 reqwest로 구현하며, 멀티파트 스트리밍 업로드와
//! 진행률 보고, 재시도, 탐지 CSV 디코딩을 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use roadscan_network::http_client::HttpDetectionClient;
//!
//! let client = HttpDetectionClient::from_config(&config)?;
//! let status = client.processing_status().await?;
//! ```

pub mod csv_codec;
pub mod http_client;
