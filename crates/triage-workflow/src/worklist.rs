//! 工作列表
//!
//! 医生看板数据与候诊队列视图

use crate::capacity::PoolLoad;
use crate::priority::PriorityPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_core::{CaseStatus, Doctor, PatientCase};
use uuid::Uuid;

/// 医生工作列表，按状态分组，各组最新的在前
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorWorklist {
    pub doctor_id: Uuid,
    pub active_cases: u32,
    pub max_cases: u32,
    pub on_duty: bool,
    pub assigned: Vec<PatientCase>,
    pub in_treatment: Vec<PatientCase>,
    pub completed: Vec<PatientCase>,
}

impl DoctorWorklist {
    pub fn build(doctor: &Doctor, mut cases: Vec<PatientCase>) -> Self {
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut worklist = Self {
            doctor_id: doctor.id,
            active_cases: doctor.active_cases,
            max_cases: doctor.max_cases,
            on_duty: doctor.on_duty,
            assigned: Vec::new(),
            in_treatment: Vec::new(),
            completed: Vec::new(),
        };

        for case in cases.into_iter().filter(|c| c.assigned_doctor == Some(doctor.id)) {
            match case.status {
                CaseStatus::Assigned => worklist.assigned.push(case),
                CaseStatus::InTreatment => worklist.in_treatment.push(case),
                CaseStatus::Completed => worklist.completed.push(case),
                CaseStatus::Waiting => {}
            }
        }

        worklist
    }

    pub fn total_cases(&self) -> usize {
        self.assigned.len() + self.in_treatment.len() + self.completed.len()
    }
}

/// 候诊队列条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub priority: f64,
    pub case: PatientCase,
}

/// 按优先级排好序的候诊队列
pub fn build_waiting_queue(policy: &PriorityPolicy, mut cases: Vec<PatientCase>, now: DateTime<Utc>) -> Vec<QueueEntry> {
    cases.retain(|c| c.status == CaseStatus::Waiting);
    policy.order_queue(&mut cases, now);
    cases
        .into_iter()
        .map(|case| QueueEntry {
            priority: policy.score(&case, now),
            case,
        })
        .collect()
}

/// 某专科的整体概况
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecializationOverview {
    pub specialization: String,
    pub waiting_cases: usize,
    pub load: PoolLoad,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use triage_core::{CaseMetadata, Gender, NewDoctor, Severity};

    fn case(severity: Severity, minutes_ago: i64) -> PatientCase {
        let meta = CaseMetadata {
            name: "List Patient".to_string(),
            age: 33,
            gender: Gender::Female,
        };
        PatientCase::new(
            meta,
            "symptoms",
            severity,
            "neurology",
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    #[test]
    fn test_worklist_groups_by_status() {
        let doctor = Doctor::new(NewDoctor {
            name: "Dr. Strange".to_string(),
            specialization: "neurology".to_string(),
            experience: 15,
            department: Some("neuro".to_string()),
            max_cases: 5,
            on_duty: true,
        })
        .unwrap();

        let mut older = case(Severity::High, 30);
        older.status = CaseStatus::Assigned;
        older.assigned_doctor = Some(doctor.id);
        let mut newer = case(Severity::Low, 5);
        newer.status = CaseStatus::Assigned;
        newer.assigned_doctor = Some(doctor.id);
        let mut treating = case(Severity::Critical, 10);
        treating.status = CaseStatus::InTreatment;
        treating.assigned_doctor = Some(doctor.id);
        let mut other = case(Severity::Critical, 10);
        other.status = CaseStatus::Completed;
        other.assigned_doctor = Some(Uuid::new_v4());

        let worklist = DoctorWorklist::build(&doctor, vec![older.clone(), treating, newer.clone(), other]);
        assert_eq!(worklist.total_cases(), 3);
        assert_eq!(worklist.assigned[0].id, newer.id);
        assert_eq!(worklist.assigned[1].id, older.id);
        assert_eq!(worklist.in_treatment.len(), 1);
        assert!(worklist.completed.is_empty());
    }

    #[test]
    fn test_waiting_queue_order() {
        let now = Utc::now();
        let low = case(Severity::Low, 1);
        let critical = case(Severity::Critical, 0);
        let medium = case(Severity::Medium, 5);

        let queue = build_waiting_queue(&PriorityPolicy::default(), vec![low.clone(), medium.clone(), critical.clone()], now);
        let ids: Vec<Uuid> = queue.iter().map(|e| e.case.id).collect();
        assert_eq!(ids, vec![critical.id, medium.id, low.id]);
        assert!(queue[0].priority >= 100.0);
    }
}
