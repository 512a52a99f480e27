//! 错误定义模块

use thiserror::Error;

/// 分诊系统统一错误类型
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态: {0}")]
    InvalidState(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidTransition { from: String, to: String },

    #[error("权限错误: {0}")]
    NotAuthorized(String),

    /// 负载计数越界，说明并发控制被绕过
    #[error("医生容量超限: {0}")]
    CapacityExceeded(String),

    /// 乐观锁版本冲突，引擎内部重试耗尽后才会返回
    #[error("并发写入冲突: {0}")]
    Conflict(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for TriageError {
    fn from(err: sqlx::Error) -> Self {
        TriageError::Database(err.to_string())
    }
}

impl TriageError {
    /// 是否为可重试的版本冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self, TriageError::Conflict(_))
    }
}

/// 分诊系统统一结果类型
pub type Result<T> = std::result::Result<T, TriageError>;
