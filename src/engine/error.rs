// ==========================================
// 配送网络优化系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 求解失败原样上抛,不重试、不降级、不给默认解
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 求解器返回非最优状态 (不可行/无界/数值失败)
    #[error("LP 求解失败: {status}")]
    SolveFailed { status: String },

    /// 解向量长度与变量布局不一致
    #[error("解向量长度不匹配: 期望 {expected}, 实际 {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn solve_failed(status: impl Into<String>) -> Self {
        EngineError::SolveFailed {
            status: status.into(),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
