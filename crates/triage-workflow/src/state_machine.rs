//! 病例状态机
//!
//! 管理病例从候诊到完成的状态转换，只允许逐级前进

use std::collections::HashMap;
use triage_core::{CaseStatus, PatientCase, Result, TriageError};
use uuid::Uuid;

/// 病例状态转换事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseEvent {
    Assign,
    StartTreatment,
    Complete,
}

impl CaseEvent {
    /// 事件在标准流程中指向的状态
    pub fn target_status(self) -> CaseStatus {
        match self {
            CaseEvent::Assign => CaseStatus::Assigned,
            CaseEvent::StartTreatment => CaseStatus::InTreatment,
            CaseEvent::Complete => CaseStatus::Completed,
        }
    }
}

/// 病例状态机
#[derive(Debug)]
pub struct CaseStateMachine {
    transitions: HashMap<(CaseStatus, CaseEvent), CaseStatus>,
}

impl CaseStateMachine {
    /// 创建标准状态机
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((CaseStatus::Waiting, CaseEvent::Assign), CaseStatus::Assigned);
        transitions.insert((CaseStatus::Assigned, CaseEvent::StartTreatment), CaseStatus::InTreatment);
        transitions.insert((CaseStatus::InTreatment, CaseEvent::Complete), CaseStatus::Completed);

        Self { transitions }
    }

    /// 额外允许已分配病例直接完成
    pub fn with_direct_completion() -> Self {
        let mut sm = Self::new();
        sm.transitions
            .insert((CaseStatus::Assigned, CaseEvent::Complete), CaseStatus::Completed);
        sm
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: CaseStatus, event: CaseEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: CaseStatus, event: CaseEvent) -> Result<CaseStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| TriageError::InvalidTransition {
                from: from.to_string(),
                to: event.target_status().to_string(),
            })
    }

    /// 按目标状态查找合法事件
    pub fn event_for(&self, from: CaseStatus, to: CaseStatus) -> Result<CaseEvent> {
        self.transitions
            .iter()
            .find(|((state, _), target)| *state == from && **target == to)
            .map(|((_, event), _)| *event)
            .ok_or_else(|| TriageError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current: CaseStatus) -> Vec<CaseEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for CaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 只有当前分配医生可以修改病例状态
pub fn ensure_case_owner(case: &PatientCase, requesting_doctor: Uuid) -> Result<()> {
    match case.assigned_doctor {
        Some(owner) if owner == requesting_doctor => Ok(()),
        _ => Err(TriageError::NotAuthorized(format!(
            "doctor {} is not assigned to case {}",
            requesting_doctor, case.id
        ))),
    }
}
