//! 医生容量模型
//!
//! 负载计数只允许由分配引擎（加一）和病例生命周期（减一）修改。

use serde::{Deserialize, Serialize};
use triage_core::{Doctor, Result, TriageError};

/// 释放负载的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadRelease {
    Released,
    /// 负载已为 0，并发完成时可能出现，不视为错误
    AlreadyAtZero,
}

pub fn is_eligible(doctor: &Doctor) -> bool {
    doctor.is_eligible()
}

/// 负载加一，已满时返回 `CapacityExceeded`
pub fn increment_load(doctor: &mut Doctor) -> Result<()> {
    if doctor.active_cases >= doctor.max_cases {
        return Err(TriageError::CapacityExceeded(format!(
            "doctor {} already holds {}/{} cases",
            doctor.id, doctor.active_cases, doctor.max_cases
        )));
    }
    doctor.active_cases += 1;
    Ok(())
}

/// 负载减一，最低为 0
pub fn decrement_load(doctor: &mut Doctor) -> LoadRelease {
    if doctor.active_cases == 0 {
        return LoadRelease::AlreadyAtZero;
    }
    doctor.active_cases -= 1;
    LoadRelease::Released
}

/// 医生池的负载概况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolLoad {
    pub total_doctors: usize,
    pub on_duty_doctors: usize,
    pub eligible_doctors: usize,
    pub active_cases: u32,
    pub on_duty_capacity: u32,
    /// 在岗医生剩余可接诊数
    pub open_slots: u32,
    pub utilization: f64,
}

/// 计算医生池负载；无在岗容量时利用率为 1.0
pub fn pool_load(doctors: &[Doctor]) -> PoolLoad {
    let on_duty: Vec<&Doctor> = doctors.iter().filter(|d| d.on_duty).collect();
    let on_duty_capacity: u32 = on_duty.iter().map(|d| d.max_cases).sum();
    let active_cases: u32 = on_duty.iter().map(|d| d.active_cases).sum();
    let open_slots: u32 = on_duty.iter().map(|d| d.remaining_capacity()).sum();

    let utilization = if on_duty_capacity == 0 {
        1.0
    } else {
        active_cases as f64 / on_duty_capacity as f64
    };

    PoolLoad {
        total_doctors: doctors.len(),
        on_duty_doctors: on_duty.len(),
        eligible_doctors: doctors.iter().filter(|d| d.is_eligible()).count(),
        active_cases,
        on_duty_capacity,
        open_slots,
        utilization,
    }
}
