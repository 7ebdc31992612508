// ==========================================
// 配送网络优化系统 - 情景杠杆领域模型
// ==========================================
// 稀疏覆写: 未出现的 DC / 区域 视为乘数 1.0
// 乘数正值由调用方保证,本层不校验
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLevers {
    /// DC ID → 产能乘数
    #[serde(default)]
    pub dc_capacity_mult: BTreeMap<String, f64>,
    /// 区域 → 需求乘数
    #[serde(default)]
    pub region_demand_mult: BTreeMap<String, f64>,
}

impl ScenarioLevers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dc_capacity(mut self, dc_id: impl Into<String>, mult: f64) -> Self {
        self.dc_capacity_mult.insert(dc_id.into(), mult);
        self
    }

    pub fn with_region_demand(mut self, region: impl Into<String>, mult: f64) -> Self {
        self.region_demand_mult.insert(region.into(), mult);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dc_capacity_mult.is_empty() && self.region_demand_mult.is_empty()
    }

    /// 从 JSON 解析,例如 {"dc_capacity_mult":{"DC1":0.9},"region_demand_mult":{"West":1.1}}
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
