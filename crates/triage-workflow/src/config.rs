//! 工作流配置

use crate::classifier::DEFAULT_MIN_SYMPTOM_LENGTH;
use crate::priority::DEFAULT_WAIT_TIME_CAP_MINUTES;
use serde::{Deserialize, Serialize};
use triage_core::{Result, TriageError};

/// 工作流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 症状描述最短长度，不足时按 low 处理
    pub min_symptom_length: usize,
    /// 版本冲突后的最大重试次数
    pub max_conflict_retries: u32,
    /// 等待时间计入优先级的上限（分钟）
    pub wait_time_cap_minutes: f64,
    /// 是否允许 assigned 直接完成
    pub allow_direct_completion: bool,
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.wait_time_cap_minutes.is_finite() || self.wait_time_cap_minutes < 0.0 {
            return Err(TriageError::Config(format!(
                "wait_time_cap_minutes must be a non-negative number, got {}",
                self.wait_time_cap_minutes
            )));
        }
        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            min_symptom_length: DEFAULT_MIN_SYMPTOM_LENGTH,
            max_conflict_retries: 5,
            wait_time_cap_minutes: DEFAULT_WAIT_TIME_CAP_MINUTES,
            allow_direct_completion: false,
        }
    }
}
