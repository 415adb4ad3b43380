//! # roadscan-app
//!
//! RoadScan 클라이언트 바이너리 진입점.
//! 설정 로드, 어댑터 생성(DI), 서브커맨드 디스패치.

mod commands;
mod lifecycle;
mod render;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use roadscan_core::config::AppConfig;
use roadscan_core::config_manager::ConfigManager;
use roadscan_core::models::detection::Severity;
use roadscan_core::query::{ClassFilter, QueryOptions, SeverityFilter, SortField, SortOrder};
use roadscan_network::http_client::HttpDetectionClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// RoadScan 도로 손상 탐지 클라이언트
///
/// 도로 점검 영상을 업로드하고, 서버 처리 상태를 추적하고, 탐지 결과를 조회한다.
#[derive(Parser, Debug)]
#[command(name = "roadscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 탐지 서비스 URL (기본: 설정 파일 또는 http://localhost:8000)
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "warn", global = true)]
    log_level: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 처리 상태 폴링 간격 (밀리초)
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 탐지 서비스 생존 확인
    Ping,

    /// 영상 업로드 후 처리 완료까지 대기
    Upload {
        /// 영상 파일 (.mp4, .avi, .mov, .mkv)
        file: PathBuf,
    },

    /// 탐지 결과 표 (필터/정렬)
    Results {
        /// 유형/심각도 부분 문자열 검색
        #[arg(long, default_value = "")]
        search: String,

        /// 심각도 필터 (all, low, medium, high, critical)
        #[arg(long, default_value = "all")]
        severity: String,

        /// 유형 필터 (all 또는 유형 이름)
        #[arg(long = "class", default_value = "all")]
        class_name: String,

        /// 정렬 기준 (timestamp, severity, confidence, depth)
        #[arg(long, default_value = "timestamp")]
        sort: String,

        /// 정렬 방향 (asc, desc)
        #[arg(long, default_value = "desc")]
        order: String,

        /// 서비스 대신 로컬 CSV 내보내기 파일 사용
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// 집계 대시보드
    Dashboard {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// High/Critical 경보 목록
    Alerts {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// 최근 리포트 요약
    Report,

    /// 탐지 결과 CSV 저장
    Export {
        /// 저장 경로 (기본: detections_<unix-millis>.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

/// CLI 문자열 → 조회 옵션
fn build_query_options(
    search: &str,
    severity: &str,
    class_name: &str,
    sort: &str,
    order: &str,
) -> Result<QueryOptions> {
    let severity_filter = if severity.eq_ignore_ascii_case("all") {
        SeverityFilter::All
    } else {
        match Severity::parse(severity) {
            Severity::Unknown => return Err(anyhow!("알 수 없는 심각도: {severity}")),
            known => SeverityFilter::Only(known),
        }
    };

    let sort_field = match sort.to_ascii_lowercase().as_str() {
        "timestamp" => SortField::Timestamp,
        "severity" => SortField::Severity,
        "confidence" | "depth" => SortField::Confidence,
        other => return Err(anyhow!("알 수 없는 정렬 기준: {other}")),
    };

    let sort_order = match order.to_ascii_lowercase().as_str() {
        "asc" => SortOrder::Asc,
        "desc" => SortOrder::Desc,
        other => return Err(anyhow!("알 수 없는 정렬 방향: {other}")),
    };

    Ok(QueryOptions {
        search_text: search.to_string(),
        severity_filter,
        class_filter: ClassFilter::from(class_name.to_string()),
        sort_field,
        sort_order,
    })
}

/// 설정 로드 — 파일 → 환경 변수 → CLI 순으로 덮어쓴다
fn load_config(args: &Args) -> Result<AppConfig> {
    let manager = match &args.config {
        Some(path) => Some(ConfigManager::with_path(path.clone())?),
        None => match ConfigManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!("설정 파일을 사용할 수 없어 기본값 사용: {e}");
                None
            }
        },
    };

    let mut config = match &manager {
        Some(manager) => {
            info!("설정 파일: {}", manager.config_path().display());
            manager.get()
        }
        None => AppConfig::default_config(),
    };

    config.apply_env_overrides();
    if let Some(ref server_url) = args.server {
        config.server.base_url = server_url.clone();
    }
    if let Some(interval) = args.poll_interval {
        config.polling.interval_ms = interval;
    }

    config
        .validate()
        .map_err(|e| anyhow!("설정 검증 실패: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화
    let log_filter = format!(
        "roadscan={},roadscan_app={},roadscan_core={},roadscan_network={},roadscan_session={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args)?;
    info!(
        "탐지 서비스: {} (타임아웃 {}ms, 폴링 {}ms)",
        config.server.base_url, config.server.request_timeout_ms, config.polling.interval_ms
    );

    // ── 어댑터 생성 (DI 와이어링) ──
    let client = Arc::new(HttpDetectionClient::from_config(&config)?);

    match args.command {
        Command::Ping => commands::ping(&client).await,
        Command::Upload { file } => commands::upload(client, &config, &file).await,
        Command::Results {
            search,
            severity,
            class_name,
            sort,
            order,
            input,
        } => {
            let options = build_query_options(&search, &severity, &class_name, &sort, &order)?;
            commands::results(&client, &options, input.as_deref()).await
        }
        Command::Dashboard { input } => commands::dashboard(&client, input.as_deref()).await,
        Command::Alerts { input } => commands::alerts(&client, input.as_deref()).await,
        Command::Report => commands::report(&client).await,
        Command::Export { output } => commands::export(&client, output).await.map(|_| ()),
    }
}
