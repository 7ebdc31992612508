// ==========================================
// 配送网络优化系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 排序方向 (Sort Order)
// ==========================================
// 成本汇总默认按降序展示,并列时按实体ID升序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    /// 仅 "asc" 解析为升序,其余一律降序
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else {
            Ok(SortOrder::Desc)
        }
    }
}

// ==========================================
// 未满足需求策略 (Unmet Demand Policy)
// ==========================================
// 同一个模型构建器同时覆盖"带惩罚"和"不允许缺货"两种建模
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "penalty", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnmetDemandPolicy {
    /// 每个门店一个缺货变量,单位惩罚成本固定
    Penalized(f64),
    /// 不建缺货变量,需求必须全部满足
    Disallowed,
}

impl UnmetDemandPolicy {
    /// 单位惩罚成本 (Disallowed 时为 None)
    pub fn penalty(&self) -> Option<f64> {
        match self {
            UnmetDemandPolicy::Penalized(p) => Some(*p),
            UnmetDemandPolicy::Disallowed => None,
        }
    }

    pub fn allows_unmet(&self) -> bool {
        matches!(self, UnmetDemandPolicy::Penalized(_))
    }
}

impl fmt::Display for UnmetDemandPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmetDemandPolicy::Penalized(p) => write!(f, "PENALIZED({})", p),
            UnmetDemandPolicy::Disallowed => write!(f, "DISALLOWED"),
        }
    }
}

// ==========================================
// 求解状态 (Solve Status)
// ==========================================
// 只有最优解才会形成快照,失败直接以错误返回
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SolveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimal" => Ok(SolveStatus::Optimal),
            other => Err(format!("未知求解状态: {}", other)),
        }
    }
}
