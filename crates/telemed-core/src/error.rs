//! 错误定义模块

use thiserror::Error;

/// 远程医疗系统统一错误类型
#[derive(Error, Debug)]
pub enum TelemedError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("无效状态转换: 状态 {status} 不允许动作 {action}")]
    InvalidState { status: String, action: String },

    #[error("前置条件不满足: {0}")]
    GuardFailed(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("外部服务错误: {0}")]
    Service(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemedError {
    /// 是否属于调用方可以修正后重试的校验类错误
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            TelemedError::InvalidState { .. } | TelemedError::GuardFailed(_)
        )
    }
}

/// 远程医疗系统统一结果类型
pub type Result<T> = std::result::Result<T, TelemedError>;
