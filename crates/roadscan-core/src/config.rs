//! 애플리케이션 설정 구조체.
//!
//! 탐지 서비스 URL, 요청 타임아웃, 폴링 주기, 업로드 허용 형식 등 런타임 설정을 정의한다.
//! [`crate::config_manager::ConfigManager`]를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;
use crate::models::video::DEFAULT_VIDEO_EXTENSIONS;

/// 서비스 URL 환경 변수
pub const API_BASE_ENV: &str = "ROADSCAN_API_BASE";

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 탐지 서비스 연결 설정
    pub server: ServerConfig,
    /// 처리 상태 폴링 설정
    #[serde(default)]
    pub polling: PollingConfig,
    /// 업로드 설정
    #[serde(default)]
    pub upload: UploadConfig,
}

/// 탐지 서비스 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 서비스 기본 URL (예: "https://detector.example.com")
    pub base_url: String,
    /// 요청 타임아웃 (밀리초). 업로드에는 적용하지 않는다.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 리포트/내보내기 요청 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// ============================================================
// 폴링 설정
// ============================================================

/// 처리 상태 폴링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// 폴링 주기 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// 세션을 실패시키기 전까지 허용하는 연속 실패 틱 수 (일시적 실패는 세지 않음)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

// ============================================================
// 업로드 설정
// ============================================================

/// 업로드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 허용 확장자 (점 없이, 대소문자 무시)
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    /// 업로드 청크 크기 (바이트) — 진행률 이벤트 단위
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: default_accepted_extensions(),
            chunk_size_bytes: default_chunk_size_bytes(),
        }
    }
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_ms: default_request_timeout_ms(),
                max_retries: default_max_retries(),
            },
            polling: PollingConfig::default(),
            upload: UploadConfig::default(),
        }
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// 폴링 주기를 Duration으로 반환
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    /// `ROADSCAN_API_BASE` 환경 변수로 서비스 URL 오버라이드
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(API_BASE_ENV) {
            let base_url = base_url.trim();
            if !base_url.is_empty() {
                self.server.base_url = base_url.to_string();
            }
        }
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        let base_url = self.server.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "server.base_url은 http(s) URL이어야 함: {base_url}"
            )));
        }
        if self.polling.interval_ms == 0 {
            return Err(CoreError::Config(
                "polling.interval_ms는 0보다 커야 함".to_string(),
            ));
        }
        if self.polling.max_consecutive_failures == 0 {
            return Err(CoreError::Config(
                "polling.max_consecutive_failures는 0보다 커야 함".to_string(),
            ));
        }
        if self.upload.chunk_size_bytes == 0 {
            return Err(CoreError::Config(
                "upload.chunk_size_bytes는 0보다 커야 함".to_string(),
            ));
        }
        if self.upload.accepted_extensions.is_empty() {
            return Err(CoreError::Config(
                "upload.accepted_extensions가 비어 있음".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_accepted_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}
fn default_chunk_size_bytes() -> usize {
    256 * 1024
}
