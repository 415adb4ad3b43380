//! 탐지 서비스 HTTP 클라이언트.
//!
//! `DetectionService` 포트 구현. 멀티파트 스트리밍 업로드 + 진행률 보고 + 재시도 로직.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use roadscan_core::config::AppConfig;
use roadscan_core::error::CoreError;
use roadscan_core::models::detection::Detection;
use roadscan_core::models::processing::{
    LastReport, ProcessingStats, ProcessingStatus, UploadAck,
};
use roadscan_core::models::video::VideoFile;
use roadscan_core::ports::detection_service::{DetectionService, ProgressCallback};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::csv_codec::parse_detections;

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// 기본 업로드 청크 크기
const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// 멀티파트 필드 이름
const VIDEO_FIELD: &str = "video";

/// 보낸 바이트 → 백분율 (0 ~ 100)
fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.saturating_mul(100)) / total).min(100) as u8
}

/// 탐지 서비스 REST 클라이언트 — `DetectionService` 포트 구현
pub struct HttpDetectionClient {
    /// 조회용 클라이언트 (요청 타임아웃 적용)
    client: reqwest::Client,
    /// 업로드용 클라이언트 (타임아웃 없음 — 전송 계층에 맡김)
    upload_client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    chunk_size: usize,
    retry_base_delay: Duration,
}

impl HttpDetectionClient {
    /// 새 HTTP 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Transport(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        let upload_client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Transport(format!("업로드 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            upload_client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// 앱 설정으로 생성
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Ok(Self::new(&config.server.base_url, config.request_timeout())?
            .with_max_retries(config.server.max_retries)
            .with_chunk_size(config.upload.chunk_size_bytes))
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 업로드 청크 크기 설정
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 재시도 초기 대기 시간 설정 (이후 2배씩, 최대 30초)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// 서비스 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 실시간 주석 프레임 스트림 URL (이미지 소스로만 소비)
    pub fn video_feed_url(&self) -> String {
        format!("{}/video_feed", self.base_url)
    }

    /// 정적 리포트 파일 URL
    ///
    /// 파일 이름은 경로 세그먼트로 퍼센트 인코딩된다.
    pub fn report_url(&self, filename: &str) -> Result<String, CoreError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| CoreError::Config(format!("잘못된 서비스 URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| CoreError::Config(format!("경로를 붙일 수 없는 URL: {}", self.base_url)))?
            .pop_if_empty()
            .push("reports")
            .push(filename);
        Ok(url.to_string())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        Err(CoreError::Server {
            status: status.as_u16(),
            message: text,
        })
    }

    /// GET 요청 후 본문 바이트 반환 (단발)
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| CoreError::Transport(format!("GET {path} 요청 실패: {e}")))?;

        let resp = self.check_response(resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CoreError::Transport(format!("GET {path} 본문 수신 실패: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// GET 요청 후 JSON 디코딩 (단발)
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let bytes = self.get_bytes(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s (최대 30초)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.retry_base_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_transient() || attempt >= self.max_retries {
                        return Err(e);
                    }

                    attempt += 1;
                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt,
                        self.max_retries + 1
                    );

                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }
    }
}

#[async_trait]
impl DetectionService for HttpDetectionClient {
    async fn ping(&self) -> Result<serde_json::Value, CoreError> {
        self.execute_with_retry(|| async {
            let bytes = self.get_bytes("/ping").await?;
            let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).trim().to_string())
            });
            Ok(value)
        })
        .await
    }

    async fn upload(
        &self,
        file: VideoFile,
        on_progress: ProgressCallback,
    ) -> Result<UploadAck, CoreError> {
        debug!(
            "영상 업로드 시작: {} ({} bytes)",
            file.file_name, file.size_bytes
        );

        let source = tokio::fs::File::open(&file.path).await?;
        let total = source.metadata().await?.len();

        // 전송 계층이 청크를 가져갈 때마다 파일에서 읽고 누적 진행률 보고.
        // 메모리에는 청크 하나만 머문다.
        let progress = on_progress.clone();
        let chunk_size = self.chunk_size;
        let stream = futures::stream::unfold((Some(source), 0u64), move |(source, sent)| {
            let progress = progress.clone();
            async move {
                let mut source = source?;
                let mut buf = vec![0u8; chunk_size];
                match source.read(&mut buf).await {
                    Ok(0) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        let sent = sent + n as u64;
                        progress(percent(sent, total));
                        Some((Ok(buf), (Some(source), sent)))
                    }
                    Err(e) => Some((Err::<Vec<u8>, std::io::Error>(e), (None, sent))),
                }
            }
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| CoreError::validation("video", format!("잘못된 MIME 타입: {e}")))?;
        let form = Form::new().part(VIDEO_FIELD, part);

        let resp = self
            .upload_client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::Transport(format!("영상 업로드 요청 실패: {e}")))?;

        let resp = self.check_response(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::Transport(format!("업로드 응답 수신 실패: {e}")))?;

        on_progress(100);

        let ack = if text.trim().is_empty() {
            UploadAck::default()
        } else {
            serde_json::from_str::<UploadAck>(&text).unwrap_or_else(|_| UploadAck {
                message: Some(text.trim().to_string()),
                ..Default::default()
            })
        };

        debug!("영상 업로드 완료: {}", file.file_name);
        Ok(ack)
    }

    async fn processing_status(&self) -> Result<ProcessingStatus, CoreError> {
        self.get_json("/processing_status").await
    }

    async fn detection_count(&self) -> Result<ProcessingStats, CoreError> {
        self.get_json("/detection_count").await
    }

    async fn last_report(&self) -> Result<LastReport, CoreError> {
        self.execute_with_retry(|| self.get_json::<LastReport>("/last_report"))
            .await
    }

    async fn export_csv(&self) -> Result<Vec<u8>, CoreError> {
        self.execute_with_retry(|| self.get_bytes("/export_csv"))
            .await
    }

    async fn fetch_detections(&self) -> Result<Vec<Detection>, CoreError> {
        let bytes = self.get_bytes("/export_csv").await?;
        parse_detections(&bytes)
    }
}
