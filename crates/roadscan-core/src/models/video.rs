//! 업로드 대상 영상 파일.
//!
//! 드롭존 경계의 검증을 담당한다. 여기서 거부된 파일은 오케스트레이터에 도달하지 않는다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// 기본 허용 확장자
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// 검증을 통과한 영상 파일 핸들
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    /// 로컬 경로
    pub path: PathBuf,
    /// 파일 이름 (multipart filename)
    pub file_name: String,
    /// 파일 크기 (바이트)
    pub size_bytes: u64,
    /// MIME 타입
    pub mime_type: String,
}

impl VideoFile {
    /// 경로를 검증하고 핸들 생성
    ///
    /// 존재 여부, 일반 파일 여부, 빈 파일 여부, 확장자(대소문자 무시)를 확인한다.
    pub fn open(path: impl AsRef<Path>, accepted_extensions: &[String]) -> Result<Self, CoreError> {
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| CoreError::validation("video", "확장자가 없는 파일"))?;

        if !accepted_extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(&extension))
        {
            return Err(CoreError::validation(
                "video",
                format!(
                    "지원하지 않는 형식 .{extension} (허용: {})",
                    accepted_extensions.join(", ")
                ),
            ));
        }

        let metadata = std::fs::metadata(path).map_err(|e| {
            CoreError::validation("video", format!("파일 접근 실패: {}: {e}", path.display()))
        })?;

        if !metadata.is_file() {
            return Err(CoreError::validation(
                "video",
                format!("일반 파일이 아님: {}", path.display()),
            ));
        }

        if metadata.len() == 0 {
            return Err(CoreError::validation("video", "빈 파일"));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size_bytes: metadata.len(),
            mime_type: mime_for_extension(&extension).to_string(),
        })
    }
}

/// 확장자별 MIME 타입
fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
