//! # 分诊工作流模块
//!
//! 提供病例分诊与医生分配的完整工作流，包括：
//! - 症状分诊：根据关键词判断严重程度和所需专科
//! - 容量模型：医生在岗状态与负载上限
//! - 优先级：按严重程度和等待时间排序候诊队列
//! - 分配引擎：负载均衡地为病例挑选医生
//! - 状态机：管理病例的完整生命周期，完成时回填候诊队列

pub mod capacity;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod memory;
pub mod priority;
pub mod routing;
pub mod state_machine;
pub mod worklist;

// 重新导出主要类型
pub use capacity::{LoadRelease, PoolLoad};
pub use classifier::{Classification, KeywordMatch, SeverityClassifier, TriageAssessment};
pub use config::WorkflowConfig;
pub use engine::TriageEngine;
pub use memory::MemoryStore;
pub use priority::{priority, PriorityPolicy};
pub use routing::{Assignment, AssignmentEngine};
pub use state_machine::{CaseEvent, CaseStateMachine};
pub use worklist::{DoctorWorklist, QueueEntry, SpecializationOverview};
