//! 候诊队列优先级
//!
//! 分值 = 严重程度权重 + 等待分钟数（封顶）。权重只给 critical 和 medium，
//! high 与 low 不加分，这是现行策略，保持原样。

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use triage_core::{PatientCase, Severity};

/// 等待时间贡献的上限（分钟）
pub const DEFAULT_WAIT_TIME_CAP_MINUTES: f64 = 60.0;

pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 100.0,
        Severity::Medium => 50.0,
        Severity::High | Severity::Low => 0.0,
    }
}

/// 优先级函数
#[derive(Debug, Clone, Copy)]
pub struct PriorityPolicy {
    wait_cap_minutes: f64,
}

impl PriorityPolicy {
    pub fn new(wait_cap_minutes: f64) -> Self {
        Self {
            wait_cap_minutes: wait_cap_minutes.max(0.0),
        }
    }

    /// 计算病例在 `now` 时刻的优先级分值
    pub fn score(&self, case: &PatientCase, now: DateTime<Utc>) -> f64 {
        let waited_ms = (now - case.created_at).num_milliseconds().max(0);
        let waited_minutes = waited_ms as f64 / 60_000.0;
        severity_weight(case.severity) + waited_minutes.min(self.wait_cap_minutes)
    }

    /// 队列比较器：分值降序，其次创建时间升序，最后按 id 保证全序
    pub fn compare(&self, a: &PatientCase, b: &PatientCase, now: DateTime<Utc>) -> Ordering {
        self.score(b, now)
            .total_cmp(&self.score(a, now))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// 就地排序候诊队列，最高优先级在前
    pub fn order_queue(&self, cases: &mut [PatientCase], now: DateTime<Utc>) {
        cases.sort_by(|a, b| self.compare(a, b, now));
    }

    /// 取优先级最高的病例
    pub fn highest<'a>(&self, cases: &'a [PatientCase], now: DateTime<Utc>) -> Option<&'a PatientCase> {
        cases.iter().min_by(|a, b| self.compare(a, b, now))
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIME_CAP_MINUTES)
    }
}

/// 使用默认策略的优先级分值
pub fn priority(case: &PatientCase, now: DateTime<Utc>) -> f64 {
    PriorityPolicy::default().score(case, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use triage_core::{CaseMetadata, Gender};

    fn case_at(severity: Severity, created_at: DateTime<Utc>) -> PatientCase {
        let meta = CaseMetadata {
            name: "Queue Patient".to_string(),
            age: 30,
            gender: Gender::Other,
        };
        PatientCase::new(meta, "symptoms", severity, "cardiology", created_at).unwrap()
    }

    #[test]
    fn test_severity_weights_follow_current_policy() {
        // high 与 low 均不加权
        assert_eq!(severity_weight(Severity::Critical), 100.0);
        assert_eq!(severity_weight(Severity::Medium), 50.0);
        assert_eq!(severity_weight(Severity::High), 0.0);
        assert_eq!(severity_weight(Severity::Low), 0.0);

        let now = Utc::now();
        let high = case_at(Severity::High, now);
        let medium = case_at(Severity::Medium, now);
        assert!(priority(&medium, now) > priority(&high, now));
    }

    #[test]
    fn test_wait_time_is_capped() {
        let now = Utc::now();
        let old = case_at(Severity::Low, now - Duration::minutes(300));
        let fresh = case_at(Severity::Low, now - Duration::minutes(10));

        assert!((priority(&old, now) - 60.0).abs() < 1e-9);
        assert!((priority(&fresh, now) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_creation_clamps_to_zero() {
        let now = Utc::now();
        let case = case_at(Severity::Medium, now + Duration::minutes(5));
        assert!((priority(&case, now) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_wait_time() {
        let created = Utc::now();
        let case = case_at(Severity::Low, created);
        let policy = PriorityPolicy::default();

        let mut last = policy.score(&case, created);
        for minutes in 1..90 {
            let score = policy.score(&case, created + Duration::minutes(minutes));
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_medium_five_minutes_beats_low_one_minute() {
        let now = Utc::now();
        let medium = case_at(Severity::Medium, now - Duration::minutes(5));
        let low = case_at(Severity::Low, now - Duration::minutes(1));

        let mut queue = vec![low.clone(), medium.clone()];
        PriorityPolicy::default().order_queue(&mut queue, now);
        assert_eq!(queue[0].id, medium.id);
        assert_eq!(queue[1].id, low.id);
    }

    #[test]
    fn test_ties_prefer_earlier_creation() {
        let now = Utc::now();
        // 都超过封顶，分值相同
        let earlier = case_at(Severity::Critical, now - Duration::minutes(120));
        let later = case_at(Severity::Critical, now - Duration::minutes(90));

        let policy = PriorityPolicy::default();
        let queue = vec![later.clone(), earlier.clone()];
        assert_eq!(policy.highest(&queue, now).map(|c| c.id), Some(earlier.id));
    }
}
