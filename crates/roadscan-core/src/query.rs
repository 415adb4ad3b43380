//! 탐지 조회 엔진.
//!
//! 상태 없는 필터 → 정렬 → 집계 파이프라인. 표/지도/대시보드 뷰가 모두 이 모듈을 거친다.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::detection::{Detection, Severity};

/// 심각도 필터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeverityFilter {
    /// 전체 (`"all"`)
    #[default]
    All,
    /// 지정 등급만
    Only(Severity),
}

impl From<String> for SeverityFilter {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("all") {
            SeverityFilter::All
        } else {
            SeverityFilter::Only(Severity::parse(&value))
        }
    }
}

impl From<SeverityFilter> for String {
    fn from(value: SeverityFilter) -> Self {
        match value {
            SeverityFilter::All => "all".to_string(),
            SeverityFilter::Only(severity) => severity.as_str().to_string(),
        }
    }
}

/// 손상 유형 필터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClassFilter {
    /// 전체 (`"all"`)
    #[default]
    All,
    /// 지정 유형만 (대소문자 무시)
    Only(String),
}

impl From<String> for ClassFilter {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("all") {
            ClassFilter::All
        } else {
            ClassFilter::Only(value)
        }
    }
}

impl From<ClassFilter> for String {
    fn from(value: ClassFilter) -> Self {
        match value {
            ClassFilter::All => "all".to_string(),
            ClassFilter::Only(class_name) => class_name,
        }
    }
}

/// 정렬 기준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Timestamp,
    Severity,
    #[serde(alias = "depth")]
    Confidence,
}

/// 정렬 방향
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 조회 옵션
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// `class_name` 또는 `severity`에 대한 대소문자 무시 부분 문자열 검색 (빈 문자열은 전체)
    pub search_text: String,
    pub severity_filter: SeverityFilter,
    pub class_filter: ClassFilter,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl QueryOptions {
    /// 레코드가 세 필터를 모두 통과하는지 (논리곱)
    pub fn matches(&self, detection: &Detection) -> bool {
        self.matches_text(detection) && self.matches_severity(detection) && self.matches_class(detection)
    }

    fn matches_text(&self, detection: &Detection) -> bool {
        let needle = self.search_text.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        detection.class_name.to_lowercase().contains(&needle)
            || detection.severity.as_str().to_lowercase().contains(&needle)
    }

    fn matches_severity(&self, detection: &Detection) -> bool {
        match self.severity_filter {
            SeverityFilter::All => true,
            SeverityFilter::Only(severity) => detection.severity == severity,
        }
    }

    fn matches_class(&self, detection: &Detection) -> bool {
        match &self.class_filter {
            ClassFilter::All => true,
            ClassFilter::Only(class_name) => detection.class_name.eq_ignore_ascii_case(class_name),
        }
    }
}

/// 필터 후 정렬된 부분집합 반환
///
/// 정렬은 안정 정렬이며, 내림차순은 오름차순 비교 결과의 부호 반전이다.
/// 따라서 동률 레코드는 방향과 무관하게 입력 순서를 유지한다.
pub fn query(detections: &[Detection], options: &QueryOptions) -> Vec<Detection> {
    let mut filtered: Vec<Detection> = detections
        .iter()
        .filter(|d| options.matches(d))
        .cloned()
        .collect();

    let by_instant = options.sort_field == SortField::Timestamp
        && !filtered.is_empty()
        && filtered.iter().all(|d| d.instant().is_some());

    filtered.sort_by(|a, b| {
        let ascending = compare(a, b, options.sort_field, by_instant);
        match options.sort_order {
            SortOrder::Asc => ascending,
            SortOrder::Desc => ascending.reverse(),
        }
    });

    filtered
}

/// 오름차순 비교자
///
/// 타임스탬프는 전체 레코드가 해석 가능할 때만 실제 시각으로 비교하고,
/// 그렇지 않으면 `frame_index`를 단조 대리값으로 쓴다 (레코드마다 섞어 쓰면 전순서가 깨진다).
fn compare(a: &Detection, b: &Detection, field: SortField, by_instant: bool) -> Ordering {
    match field {
        SortField::Timestamp if by_instant => a.instant().cmp(&b.instant()),
        SortField::Timestamp => a.frame_index.cmp(&b.frame_index),
        SortField::Severity => a.severity.rank().cmp(&b.severity.rank()),
        SortField::Confidence => a.confidence.total_cmp(&b.confidence),
    }
}

/// 대시보드 집계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    /// 유형별 개수 (서버가 보낸 `class_name` 그대로)
    pub by_class: BTreeMap<String, usize>,
    /// 심각도별 개수 (알려진 네 등급은 항상 포함)
    pub by_severity: BTreeMap<Severity, usize>,
    pub total: usize,
    pub critical_count: usize,
    pub high_count: usize,
    /// 바운딩 박스 면적 합
    pub total_area_px: u64,
    /// 평균 신뢰도 (빈 입력이면 None — 0도 NaN도 아님)
    pub avg_confidence: Option<f64>,
}

impl Aggregate {
    /// Low 등급 비율 (%) — 빈 입력이면 None
    pub fn low_severity_share(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let low = self.by_severity.get(&Severity::Low).copied().unwrap_or(0);
        Some(low as f64 / self.total as f64 * 100.0)
    }

    /// 심각도별 개수 (높은 등급 순, 차트 막대 순서)
    pub fn severity_bars(&self) -> Vec<(Severity, usize)> {
        Severity::KNOWN
            .iter()
            .map(|s| (*s, self.by_severity.get(s).copied().unwrap_or(0)))
            .collect()
    }
}

/// 탐지 집합 집계
pub fn aggregate(detections: &[Detection]) -> Aggregate {
    let mut by_class: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_severity: BTreeMap<Severity, usize> =
        Severity::KNOWN.iter().map(|s| (*s, 0)).collect();
    let mut total_area_px = 0u64;
    let mut confidence_sum = 0.0f64;

    for detection in detections {
        *by_class.entry(detection.class_name.clone()).or_insert(0) += 1;
        *by_severity.entry(detection.severity).or_insert(0) += 1;
        total_area_px = total_area_px.saturating_add(detection.bbox_area_px);
        confidence_sum += detection.confidence;
    }

    let total = detections.len();
    let avg_confidence = (total > 0).then(|| confidence_sum / total as f64);

    Aggregate {
        critical_count: by_severity.get(&Severity::Critical).copied().unwrap_or(0),
        high_count: by_severity.get(&Severity::High).copied().unwrap_or(0),
        by_class,
        by_severity,
        total,
        total_area_px,
        avg_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(frame: u64, class: &str, severity: Severity, confidence: f64) -> Detection {
        Detection {
            frame_index: frame,
            timestamp: String::new(),
            latitude: None,
            longitude: None,
            class_id: None,
            class_name: class.to_string(),
            confidence,
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            bbox_area_px: 100,
            frame_w: None,
            frame_h: None,
            severity,
        }
    }

    fn mixed() -> Vec<Detection> {
        vec![
            det(3, "Crack", Severity::Medium, 0.55),
            det(1, "Pothole", Severity::Critical, 0.91),
            det(7, "Patch", Severity::Low, 0.40),
            det(2, "Pothole", Severity::High, 0.77),
            det(5, "Debris", Severity::Medium, 0.55),
            det(4, "Manhole", Severity::Unknown, 0.60),
        ]
    }

    fn frames(ds: &[Detection]) -> Vec<u64> {
        ds.iter().map(|d| d.frame_index).collect()
    }

    #[test]
    fn end_to_end_severity_filter_and_aggregate() {
        let ds = vec![
            det(0, "Pothole", Severity::Critical, 0.9),
            det(1, "Crack", Severity::Low, 0.4),
        ];
        let options = QueryOptions {
            severity_filter: SeverityFilter::Only(Severity::Critical),
            ..Default::default()
        };
        assert_eq!(query(&ds, &options), vec![ds[0].clone()]);

        let agg = aggregate(&ds);
        assert_eq!(agg.critical_count, 1);
        assert_eq!(agg.total, 2);
        assert!((agg.avg_confidence.unwrap() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn empty_input() {
        assert!(query(&[], &QueryOptions::default()).is_empty());

        let agg = aggregate(&[]);
        assert_eq!(agg.total, 0);
        assert_eq!(agg.critical_count, 0);
        assert_eq!(agg.avg_confidence, None);
        assert_eq!(agg.low_severity_share(), None);
        assert!(agg.by_class.is_empty());
        assert!(agg.severity_bars().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn search_matches_class_or_severity_case_insensitive() {
        let ds = mixed();
        let options = QueryOptions {
            search_text: "POT".to_string(),
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        assert_eq!(frames(&query(&ds, &options)), vec![1, 2]);

        let options = QueryOptions {
            search_text: "medium".to_string(),
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        assert_eq!(frames(&query(&ds, &options)), vec![3, 5]);
    }

    #[test]
    fn whitespace_search_is_literal() {
        let mut ds = mixed();
        ds.push(det(9, "Road Marking", Severity::Low, 0.3));
        let options = QueryOptions {
            search_text: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(frames(&query(&ds, &options)), vec![9]);

        let options = QueryOptions {
            search_text: " pot".to_string(),
            ..Default::default()
        };
        assert!(query(&ds, &options).is_empty());
    }

    #[test]
    fn filters_are_conjunctive() {
        let ds = mixed();
        let options = QueryOptions {
            search_text: "hole".to_string(),
            severity_filter: SeverityFilter::Only(Severity::High),
            class_filter: ClassFilter::Only("pothole".to_string()),
            ..Default::default()
        };
        assert_eq!(frames(&query(&ds, &options)), vec![2]);
    }

    #[test]
    fn unknown_class_only_fails_to_match() {
        let ds = mixed();
        let options = QueryOptions {
            class_filter: ClassFilter::Only("Rut".to_string()),
            ..Default::default()
        };
        assert!(query(&ds, &options).is_empty());
    }

    #[test]
    fn result_is_subset_and_idempotent() {
        let ds = mixed();
        let options = QueryOptions {
            search_text: "e".to_string(),
            sort_field: SortField::Severity,
            ..Default::default()
        };
        let once = query(&ds, &options);
        assert!(once.len() <= ds.len());
        assert!(once.iter().all(|d| ds.contains(d)));
        assert_eq!(query(&once, &options), once);
    }

    #[test]
    fn severity_sort_ranks_unknown_first_ascending() {
        let ds = mixed();
        let options = QueryOptions {
            sort_field: SortField::Severity,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let sorted = query(&ds, &options);
        assert_eq!(sorted.first().unwrap().severity, Severity::Unknown);
        assert_eq!(sorted.last().unwrap().severity, Severity::Critical);
        // 동률(Medium)은 입력 순서 유지
        assert_eq!(frames(&sorted), vec![4, 7, 3, 5, 2, 1]);
    }

    #[test]
    fn descending_is_reverse_of_ascending_modulo_ties() {
        let ds = mixed();
        for field in [SortField::Timestamp, SortField::Severity, SortField::Confidence] {
            let asc = query(
                &ds,
                &QueryOptions {
                    sort_field: field,
                    sort_order: SortOrder::Asc,
                    ..Default::default()
                },
            );
            let desc = query(
                &ds,
                &QueryOptions {
                    sort_field: field,
                    sort_order: SortOrder::Desc,
                    ..Default::default()
                },
            );
            // 정렬 키 시퀀스는 정확히 역순
            let key = |d: &Detection| match field {
                SortField::Timestamp => d.frame_index as f64,
                SortField::Severity => d.severity.rank() as f64,
                SortField::Confidence => d.confidence,
            };
            let asc_keys: Vec<f64> = asc.iter().map(key).collect();
            let mut desc_keys: Vec<f64> = desc.iter().map(key).collect();
            desc_keys.reverse();
            assert_eq!(asc_keys, desc_keys, "{field:?}");
        }

        // 동률(confidence 0.55: frame 3, 5)은 양방향 모두 입력 순서
        let desc = query(
            &ds,
            &QueryOptions {
                sort_field: SortField::Confidence,
                sort_order: SortOrder::Desc,
                ..Default::default()
            },
        );
        let tied: Vec<u64> = desc
            .iter()
            .filter(|d| d.confidence == 0.55)
            .map(|d| d.frame_index)
            .collect();
        assert_eq!(tied, vec![3, 5]);
    }

    #[test]
    fn timestamp_sort_uses_instant_when_all_parse() {
        let mut ds = vec![
            det(1, "Crack", Severity::Low, 0.5),
            det(2, "Crack", Severity::Low, 0.5),
        ];
        ds[0].timestamp = "2025-03-01 10:00:09".to_string();
        ds[1].timestamp = "2025-03-01 10:00:01".to_string();
        let options = QueryOptions {
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        assert_eq!(frames(&query(&ds, &options)), vec![2, 1]);

        // 하나라도 해석 불가하면 frame_index로 대체
        ds[1].timestamp = "unknown".to_string();
        assert_eq!(frames(&query(&ds, &options)), vec![1, 2]);
    }

    #[test]
    fn aggregate_counts_by_class_and_severity() {
        let agg = aggregate(&mixed());
        assert_eq!(agg.total, 6);
        assert_eq!(agg.by_class["Pothole"], 2);
        assert_eq!(agg.by_class["Manhole"], 1);
        assert_eq!(agg.by_severity[&Severity::Medium], 2);
        assert_eq!(agg.by_severity[&Severity::Unknown], 1);
        assert_eq!(agg.high_count, 1);
        assert_eq!(agg.total_area_px, 600);
        let bars = agg.severity_bars();
        assert_eq!(bars[0], (Severity::Critical, 1));
        assert_eq!(bars[3], (Severity::Low, 1));
        let share = agg.low_severity_share().unwrap();
        assert!((share - 100.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn options_deserialize_with_wildcards_and_alias() {
        let options: QueryOptions = serde_json::from_str(
            r#"{"search_text":"","severity_filter":"all","class_filter":"crack","sort_field":"depth","sort_order":"asc"}"#,
        )
        .unwrap();
        assert_eq!(options.severity_filter, SeverityFilter::All);
        assert_eq!(options.class_filter, ClassFilter::Only("crack".to_string()));
        assert_eq!(options.sort_field, SortField::Confidence);
        assert_eq!(options.sort_order, SortOrder::Asc);

        let defaults: QueryOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, QueryOptions::default());
    }
}
