//! # 分诊数据库模块
//!
//! 基于 PostgreSQL 的病例、医生与护理记录存储，实现 `TriageStore` 端口，
//! 多记录写入在事务中按版本号校验后提交。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabaseConfig, DatabasePool};
pub use models::{DbDoctor, DbNursingNote, DbPatientCase};
pub use queries::PostgresStore;
