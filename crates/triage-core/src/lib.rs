//! # Triage Core
//!
//! 分诊系统的核心模块，提供病例与医生数据模型、错误定义、持久化端口和通用工具。

pub mod error;
pub mod models;
pub mod store;
pub mod utils;

pub use error::{Result, TriageError};
pub use models::*;
pub use store::{ChangeSet, TriageStore};
