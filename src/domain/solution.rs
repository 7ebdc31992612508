// ==========================================
// 配送网络优化系统 - 求解结果领域模型
// ==========================================
// 职责: 流量、未满足需求、解快照
// 红线: 快照是原子单位,每次求解整体替换,不做增量追加
// ==========================================

use crate::domain::metrics::DerivedMetrics;
use crate::domain::types::{SolveStatus, UnmetDemandPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Flow - 线路流量 (派生数据)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub dc_id: String,
    pub store_id: String,
    pub units_assigned: f64,      // 分配件数
    pub cost_per_unit: f64,       // 单位运费
    pub flow_cost: f64,           // units_assigned * cost_per_unit
}

// ==========================================
// UnmetDemand - 未满足需求 (派生数据)
// ==========================================
// 每个门店一行,包括 0 值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmetDemand {
    pub store_id: String,
    pub unmet_units: f64,
}

// ==========================================
// SolutionSnapshot - 解快照
// ==========================================
// generation 单调递增,读方按 "第 N 代" 请求数据,不存在过期缓存歧义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSnapshot {
    pub snapshot_id: String,          // 快照UUID
    pub generation: u64,              // 代号 (持久化时分配)
    pub network_revision: u64,        // 求解所用的网络配置修订号
    pub status: SolveStatus,
    pub unmet_policy: UnmetDemandPolicy,
    pub objective_value: f64,         // 由原始解向量 c·x 计算的目标值
    pub flows: Vec<Flow>,
    pub unmet_demand: Vec<UnmetDemand>,
    pub metrics: DerivedMetrics,
    pub created_at: DateTime<Utc>,
}

impl SolutionSnapshot {
    pub fn total_shipped_units(&self) -> f64 {
        self.flows.iter().map(|f| f.units_assigned).sum()
    }

    pub fn total_unmet_units(&self) -> f64 {
        self.unmet_demand.iter().map(|u| u.unmet_units).sum()
    }

    /// 指定门店的已发运件数
    pub fn shipped_to_store(&self, store_id: &str) -> f64 {
        self.flows
            .iter()
            .filter(|f| f.store_id == store_id)
            .map(|f| f.units_assigned)
            .sum()
    }

    /// 指定 DC 的已发运件数
    pub fn shipped_from_dc(&self, dc_id: &str) -> f64 {
        self.flows
            .iter()
            .filter(|f| f.dc_id == dc_id)
            .map(|f| f.units_assigned)
            .sum()
    }

    pub fn unmet_for_store(&self, store_id: &str) -> Option<f64> {
        self.unmet_demand
            .iter()
            .find(|u| u.store_id == store_id)
            .map(|u| u.unmet_units)
    }
}
