//! 医生分配引擎
//!
//! 按专科匹配可分配医生，负载最小优先，负载相同时经验多者优先。
//! 引擎只计算分配结果并返回更新后的记录副本，写入由调用方原子提交。

use crate::capacity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use triage_core::{CaseStatus, Doctor, PatientCase, Result, TriageError};

/// 分配结果：两条记录须一起提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub case: PatientCase,
    pub doctor: Doctor,
}

/// 分配引擎
#[derive(Debug, Clone, Default)]
pub struct AssignmentEngine;

impl AssignmentEngine {
    pub fn new() -> Self {
        Self
    }

    /// 负载升序，经验降序，最后按 id 保证结果确定
    fn rank(a: &Doctor, b: &Doctor) -> Ordering {
        a.active_cases
            .cmp(&b.active_cases)
            .then_with(|| b.experience.cmp(&a.experience))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// 从候选医生中挑选最合适的一位
    pub fn select_doctor<'a>(&self, case: &PatientCase, doctors: &'a [Doctor]) -> Option<&'a Doctor> {
        doctors
            .iter()
            .filter(|doctor| doctor.specialization == case.specialization && capacity::is_eligible(doctor))
            .min_by(|a, b| Self::rank(a, b))
    }

    /// 为候诊病例计算分配；无可分配医生时返回 `None`，病例继续候诊
    pub fn assign(&self, case: &PatientCase, doctors: &[Doctor], now: DateTime<Utc>) -> Result<Option<Assignment>> {
        ensure_waiting(case)?;

        let Some(selected) = self.select_doctor(case, doctors) else {
            tracing::info!(
                "No eligible {} doctor for case {}, keeping it in the waiting queue",
                case.specialization,
                case.id
            );
            return Ok(None);
        };

        self.assign_to(case, selected, now).map(Some)
    }

    /// 把病例分配给指定医生，医生须可分配
    pub fn assign_to(&self, case: &PatientCase, doctor: &Doctor, now: DateTime<Utc>) -> Result<Assignment> {
        ensure_waiting(case)?;

        let mut doctor = doctor.clone();
        capacity::increment_load(&mut doctor)?;
        doctor.updated_at = now;

        let mut case = case.clone();
        case.status = CaseStatus::Assigned;
        case.assigned_doctor = Some(doctor.id);
        case.updated_at = now;

        tracing::info!(
            "Assigned case {} ({} / {}) to doctor {} ({}/{})",
            case.id,
            case.severity,
            case.specialization,
            doctor.id,
            doctor.active_cases,
            doctor.max_cases
        );

        Ok(Assignment { case, doctor })
    }
}

fn ensure_waiting(case: &PatientCase) -> Result<()> {
    if case.status != CaseStatus::Waiting {
        return Err(TriageError::InvalidState(format!(
            "case {} is {} and cannot be assigned",
            case.id, case.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{CaseMetadata, Gender, NewDoctor, Severity};
    use uuid::Uuid;

    fn doctor(specialization: &str, experience: u32, active: u32, max: u32, on_duty: bool) -> Doctor {
        let mut d = Doctor::new(NewDoctor {
            name: format!("Dr. {}", experience),
            specialization: specialization.to_string(),
            experience,
            department: None,
            max_cases: max,
            on_duty,
        })
        .unwrap();
        d.active_cases = active;
        d
    }

    fn waiting_case(specialization: &str) -> PatientCase {
        let meta = CaseMetadata {
            name: "Pat".to_string(),
            age: 55,
            gender: Gender::Male,
        };
        PatientCase::new(meta, "severe chest pain", Severity::Critical, specialization, Utc::now()).unwrap()
    }

    #[test]
    fn test_assign_cardiology_scenario() {
        let engine = AssignmentEngine::new();
        let case = waiting_case("cardiology");
        let doctors = vec![doctor("cardiology", 8, 0, 5, true)];

        let assignment = engine.assign(&case, &doctors, Utc::now()).unwrap().unwrap();
        assert_eq!(assignment.case.status, CaseStatus::Assigned);
        assert_eq!(assignment.case.assigned_doctor, Some(doctors[0].id));
        assert_eq!(assignment.doctor.active_cases, 1);
        // 原记录不被修改
        assert_eq!(doctors[0].active_cases, 0);
        assert_eq!(case.status, CaseStatus::Waiting);
    }

    #[test]
    fn test_least_loaded_then_most_experienced() {
        let engine = AssignmentEngine::new();
        let case = waiting_case("neurology");
        let doctors = vec![
            doctor("neurology", 20, 3, 5, true),
            doctor("neurology", 5, 1, 5, true),
            doctor("neurology", 9, 1, 5, true),
            doctor("neurology", 30, 0, 5, false),
        ];

        let selected = engine.select_doctor(&case, &doctors).unwrap();
        assert_eq!(selected.id, doctors[2].id);
    }

    #[test]
    fn test_never_selects_full_or_off_duty() {
        let engine = AssignmentEngine::new();
        let case = waiting_case("cardiology");
        let doctors = vec![
            doctor("cardiology", 10, 5, 5, true),
            doctor("cardiology", 10, 0, 5, false),
        ];

        assert!(engine.assign(&case, &doctors, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_no_cross_specialization_fallback() {
        let engine = AssignmentEngine::new();
        let case = waiting_case("pulmonology");
        let doctors = vec![doctor("general", 10, 0, 5, true)];

        assert!(engine.assign(&case, &doctors, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_non_waiting_case_is_rejected() {
        let engine = AssignmentEngine::new();
        let mut case = waiting_case("cardiology");
        case.status = CaseStatus::Assigned;
        case.assigned_doctor = Some(Uuid::new_v4());
        let doctors = vec![doctor("cardiology", 10, 0, 5, true)];

        let result = engine.assign(&case, &doctors, Utc::now());
        assert!(matches!(result, Err(TriageError::InvalidState(_))));
    }

    #[test]
    fn test_assign_to_full_doctor_fails() {
        let engine = AssignmentEngine::new();
        let case = waiting_case("cardiology");
        let full = doctor("cardiology", 10, 2, 2, true);

        let result = engine.assign_to(&case, &full, Utc::now());
        assert!(matches!(result, Err(TriageError::CapacityExceeded(_))));
    }
}
