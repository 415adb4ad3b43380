//! 터미널 출력.
//!
//! 표, 대시보드, 경보, 리포트 요약을 문자열로 만든다. 출력(println)은 호출자가 한다.

use std::fmt::Write;

use roadscan_core::models::detection::Detection;
use roadscan_core::models::processing::{LastReport, ProcessingStats};
use roadscan_core::models::session::{UploadSession, UploadState};
use roadscan_core::query::Aggregate;
use roadscan_core::views::{map_center, map_points};

const BAR_WIDTH: usize = 30;

/// 소수 두 자리, 없으면 "-"
fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

/// 진행 막대
fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (count * width).div_ceil(max);
    "█".repeat(filled.min(width))
}

/// 탐지 표 + "Showing N of M"
pub fn detection_table(rows: &[Detection], total: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>7}  {:<20}  {:<12}  {:<9}  {:>6}  {:>9}  {:>9}  {:>9}",
        "FRAME", "TIMESTAMP", "CLASS", "SEVERITY", "CONF", "AREA(px)", "LAT", "LON"
    );
    for d in rows {
        let (lat, lon) = d
            .location()
            .map(|(lat, lon)| (format!("{lat:.4}"), format!("{lon:.4}")))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
        let _ = writeln!(
            out,
            "{:>7}  {:<20}  {:<12}  {:<9}  {:>6.2}  {:>9}  {:>9}  {:>9}",
            d.frame_index,
            truncate(&d.timestamp, 20),
            truncate(&d.class_name, 12),
            d.severity.as_str(),
            d.confidence,
            d.bbox_area_px,
            lat,
            lon
        );
    }
    let _ = write!(out, "Showing {} of {} detections", rows.len(), total);
    out
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        value.chars().take(width.saturating_sub(1)).chain(['…']).collect()
    }
}

/// 대시보드 요약
pub fn dashboard(summary: &Aggregate, detections: &[Detection]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 탐지 요약");
    let _ = writeln!(out, "  전체 탐지:      {}", summary.total);
    let _ = writeln!(out, "  Critical:       {}", summary.critical_count);
    let _ = writeln!(out, "  High:           {}", summary.high_count);
    let _ = writeln!(out, "  평균 신뢰도:    {}", fmt_opt(summary.avg_confidence));
    let _ = writeln!(out, "  총 면적(px):    {}", summary.total_area_px);
    let _ = writeln!(
        out,
        "  Low 비율(%):    {}",
        fmt_opt(summary.low_severity_share())
    );

    let bars = summary.severity_bars();
    let max = bars.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let _ = writeln!(out, "\n심각도 분포");
    for (severity, count) in &bars {
        let _ = writeln!(
            out,
            "  {:<9} {:>5}  {}",
            severity.as_str(),
            count,
            bar(*count, max, BAR_WIDTH)
        );
    }

    if !summary.by_class.is_empty() {
        let max = summary.by_class.values().copied().max().unwrap_or(0);
        let _ = writeln!(out, "\n유형별 분포");
        for (class_name, count) in &summary.by_class {
            let _ = writeln!(
                out,
                "  {:<12} {:>5}  {}",
                truncate(class_name, 12),
                count,
                bar(*count, max, BAR_WIDTH)
            );
        }
    }

    let points = map_points(detections);
    let (lat, lon) = map_center(detections);
    let _ = write!(
        out,
        "\n🗺  위치 정보: {}건 (지도 중심 {lat:.4}, {lon:.4})",
        points.len()
    );
    out
}

/// 경보 목록
///
/// `sent_total`은 세션 동안 발송 처리된 누적 건수. 발송 기록이 없는 단발 조회는 `None`.
pub fn alerts(pending: &[&Detection], sent_total: Option<usize>) -> String {
    let mut out = String::new();
    if pending.is_empty() {
        let _ = write!(out, "✅ 새 경보 없음");
        if let Some(sent) = sent_total {
            let _ = write!(out, " (발송 완료 {sent}건)");
        }
        return out;
    }
    let _ = writeln!(out, "🚨 경보 대상 {}건", pending.len());
    for d in pending {
        let location = d
            .location()
            .map(|(lat, lon)| format!("{lat:.5}, {lon:.5}"))
            .unwrap_or_else(|| "위치 없음".to_string());
        let _ = writeln!(
            out,
            "  [{}] frame {} {} (신뢰도 {:.2}) @ {}",
            d.severity.as_str(),
            d.frame_index,
            d.class_name,
            d.confidence,
            location
        );
    }
    if let Some(sent) = sent_total {
        let _ = write!(out, "발송 완료 {sent}건");
    }
    out.trim_end().to_string()
}

/// 최근 리포트 요약
pub fn report_summary(report: &LastReport, report_url: Option<&str>) -> String {
    if !report.has_report() {
        return "No reports yet".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "📄 최근 리포트");
    let _ = writeln!(
        out,
        "  파일:           {}",
        report.csv_path.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "  전체 탐지:      {}",
        report
            .total_detections
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  총 면적:        {}", fmt_opt(report.total_area));
    let _ = write!(out, "  평균 신뢰도:    {}", fmt_opt(report.avg_confidence));
    if let Some(url) = report_url {
        let _ = write!(out, "\n  다운로드:       {url}");
    }
    out
}

/// 업로드 세션 한 줄 상태
pub fn session_line(session: &UploadSession, stats: Option<&ProcessingStats>) -> String {
    let name = session.file_name.as_deref().unwrap_or("-");
    match session.state {
        UploadState::Idle => "대기 중".to_string(),
        UploadState::Selected => format!("📁 {name} 선택됨"),
        UploadState::Uploading => format!(
            "⬆️  {name} 업로드 중 [{:<20}] {:>3}%",
            bar(session.progress_percent as usize, 100, 20),
            session.progress_percent
        ),
        UploadState::Processing => match stats {
            Some(stats) => format!(
                "⚙️  서버 처리 중 — 탐지 {}건, 면적 {:.0}px, 평균 신뢰도 {}",
                stats.detection_count,
                stats.total_area,
                fmt_opt(stats.avg_confidence)
            ),
            None => "⚙️  서버 처리 중...".to_string(),
        },
        UploadState::Complete => format!("✅ {name} 처리 완료"),
        UploadState::Failed => format!(
            "❌ {name} 실패: {}",
            session.error.as_deref().unwrap_or("알 수 없는 오류")
        ),
    }
}
