// ==========================================
// 配送网络优化系统 - 优化器参数
// ==========================================
// 职责: 求解与派生指标使用的全部常量,显式传入引擎
// ==========================================

use crate::domain::types::UnmetDemandPolicy;
use serde::{Deserialize, Serialize};

/// 默认单位缺货惩罚成本 (唯一规范值,可经 config_kv 覆写)
pub const DEFAULT_UNMET_PENALTY_PER_UNIT: f64 = 10.0;

/// 求解器噪声阈值: 低于该值的变量视为 0
pub const DEFAULT_ZERO_TOLERANCE: f64 = 1e-6;

/// 慢线路阈值 (天, 严格大于)
pub const DEFAULT_SLOW_LANE_THRESHOLD_DAYS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub unmet_policy: UnmetDemandPolicy,
    pub zero_tolerance: f64,
    pub slow_lane_threshold_days: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            unmet_policy: UnmetDemandPolicy::Penalized(DEFAULT_UNMET_PENALTY_PER_UNIT),
            zero_tolerance: DEFAULT_ZERO_TOLERANCE,
            slow_lane_threshold_days: DEFAULT_SLOW_LANE_THRESHOLD_DAYS,
        }
    }
}

impl OptimizerConfig {
    pub fn with_penalty(penalty: f64) -> Self {
        Self {
            unmet_policy: UnmetDemandPolicy::Penalized(penalty),
            ..Self::default()
        }
    }

    /// 缺货惩罚 (不允许缺货时按 0 计)
    pub fn penalty_or_zero(&self) -> f64 {
        self.unmet_policy.penalty().unwrap_or(0.0)
    }
}
