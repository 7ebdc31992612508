// ==========================================
// 配送网络优化系统 - 派生指标领域模型
// ==========================================
// 职责: 利用率、成本汇总、慢线路、头部KPI 的行结构
// 说明: 指标名与下游读方约定一致 (kpi_summary 的 metric 列)
// ==========================================

use crate::domain::types::SortOrder;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// KPI 指标名
pub mod metric_names {
    pub const TOTAL_TRANSPORT_COST: &str = "total_transport_cost_usd";
    pub const UNMET_PENALTY: &str = "unmet_penalty_usd";
    pub const TOTAL_COST_WITH_PENALTY: &str = "total_cost_with_penalty_usd";
    pub const TOTAL_UNITS: &str = "total_units";
    pub const TOTAL_SHIPPED_UNITS: &str = "total_shipped_units";
    pub const UNMET_UNITS: &str = "unmet_units";
    pub const PCT_UNITS_ON_SLOW_LANES: &str = "pct_units_on_slow_lanes";
    pub const NUM_DCS: &str = "num_dcs";
    pub const NUM_STORES: &str = "num_stores";
    pub const LP_STATUS: &str = "lp_status";
}

// ==========================================
// DcUtilization - DC 利用率
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcUtilization {
    pub dc_id: String,
    pub weekly_capacity: f64,
    pub units_assigned: f64,
    pub utilization_pct: f64,     // 保留两位小数
}

// ==========================================
// 成本汇总行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcCost {
    pub dc_id: String,
    pub flow_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCost {
    pub region: String,
    pub flow_cost: f64,
}

/// 成本汇总行的统一排序接口
pub trait CostRollup {
    fn rollup_key(&self) -> &str;
    fn rollup_cost(&self) -> f64;
}

impl CostRollup for DcCost {
    fn rollup_key(&self) -> &str {
        &self.dc_id
    }
    fn rollup_cost(&self) -> f64 {
        self.flow_cost
    }
}

impl CostRollup for RegionCost {
    fn rollup_key(&self) -> &str {
        &self.region
    }
    fn rollup_cost(&self) -> f64 {
        self.flow_cost
    }
}

/// 按成本排序,并列时按 key 升序 (与排序方向无关)
pub fn sort_cost_rows<T: CostRollup>(rows: &mut [T], order: SortOrder) {
    rows.sort_by(|a, b| {
        let by_cost = a
            .rollup_cost()
            .partial_cmp(&b.rollup_cost())
            .unwrap_or(Ordering::Equal);
        let by_cost = match order {
            SortOrder::Asc => by_cost,
            SortOrder::Desc => by_cost.reverse(),
        };
        by_cost.then_with(|| a.rollup_key().cmp(b.rollup_key()))
    });
}

// ==========================================
// StoresServed - DC 服务门店数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoresServed {
    pub dc_id: String,
    pub stores_served: usize,
}

// ==========================================
// 慢线路
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowLane {
    pub dc_id: String,
    pub store_id: String,
    pub service_time_days: f64,
    pub units_assigned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowLaneKpis {
    pub threshold_days: f64,
    pub slow_lane_count: usize,
    pub units_on_slow_lanes: f64,
    pub total_shipped_units: f64,
    pub pct_units_on_slow_lanes: f64, // 分母下限为 1 件
}

impl SlowLaneKpis {
    /// 慢线路件数合计,按 (dc_id, store_id) 升序累加
    pub fn sum_units(lanes: &[SlowLane]) -> f64 {
        let mut ordered: Vec<&SlowLane> = lanes.iter().collect();
        ordered.sort_by(|a, b| (&a.dc_id, &a.store_id).cmp(&(&b.dc_id, &b.store_id)));
        ordered.iter().map(|s| s.units_assigned).sum()
    }
}

// ==========================================
// HeadlineKpis - 头部KPI
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineKpis {
    pub total_transport_cost: f64,
    pub unmet_penalty_cost: f64,
    pub total_cost_with_penalty: f64,
    pub total_units: f64,             // 总需求
    pub total_shipped_units: f64,
    pub unmet_units: f64,
    pub pct_units_on_slow_lanes: f64,
    pub num_dcs: usize,
    pub num_stores: usize,
    pub lp_status: String,
}

/// KPI 值: 数值或文本 (lp_status)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

impl KpiValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KpiValue::Number(v) => Some(*v),
            KpiValue::Text(t) => t.parse().ok(),
        }
    }
}

impl std::fmt::Display for KpiValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KpiValue::Number(v) => write!(f, "{}", v),
            KpiValue::Text(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRow {
    pub metric: String,
    pub value: KpiValue,
}

impl HeadlineKpis {
    /// 展开为 metric → value 行 (固定顺序)
    pub fn to_rows(&self) -> Vec<KpiRow> {
        use metric_names::*;
        let num = |metric: &str, v: f64| KpiRow {
            metric: metric.to_string(),
            value: KpiValue::Number(v),
        };
        vec![
            num(TOTAL_TRANSPORT_COST, self.total_transport_cost),
            num(UNMET_PENALTY, self.unmet_penalty_cost),
            num(TOTAL_COST_WITH_PENALTY, self.total_cost_with_penalty),
            num(TOTAL_UNITS, self.total_units),
            num(TOTAL_SHIPPED_UNITS, self.total_shipped_units),
            num(UNMET_UNITS, self.unmet_units),
            num(PCT_UNITS_ON_SLOW_LANES, self.pct_units_on_slow_lanes),
            num(NUM_DCS, self.num_dcs as f64),
            num(NUM_STORES, self.num_stores as f64),
            KpiRow {
                metric: LP_STATUS.to_string(),
                value: KpiValue::Text(self.lp_status.clone()),
            },
        ]
    }

    /// 从 metric → value 行还原 (缺失的数值按 0 处理)
    pub fn from_rows(rows: &[KpiRow]) -> Self {
        use metric_names::*;
        let get = |metric: &str| -> f64 {
            rows.iter()
                .find(|r| r.metric == metric)
                .and_then(|r| r.value.as_f64())
                .unwrap_or(0.0)
        };
        let lp_status = rows
            .iter()
            .find(|r| r.metric == LP_STATUS)
            .map(|r| r.value.to_string())
            .unwrap_or_default();

        Self {
            total_transport_cost: get(TOTAL_TRANSPORT_COST),
            unmet_penalty_cost: get(UNMET_PENALTY),
            total_cost_with_penalty: get(TOTAL_COST_WITH_PENALTY),
            total_units: get(TOTAL_UNITS),
            total_shipped_units: get(TOTAL_SHIPPED_UNITS),
            unmet_units: get(UNMET_UNITS),
            pct_units_on_slow_lanes: get(PCT_UNITS_ON_SLOW_LANES),
            num_dcs: get(NUM_DCS) as usize,
            num_stores: get(NUM_STORES) as usize,
            lp_status,
        }
    }
}

// ==========================================
// DerivedMetrics - 一次求解的全部派生指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub dc_utilization: Vec<DcUtilization>,   // dc_id 升序
    pub cost_by_dc: Vec<DcCost>,              // 成本降序
    pub cost_by_region: Vec<RegionCost>,      // 成本降序
    pub stores_served_by_dc: Vec<StoresServed>,
    pub slow_lanes: Vec<SlowLane>,            // 件数降序
    pub slow_lane_kpis: SlowLaneKpis,
    pub kpis: HeadlineKpis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_cost_rows_tie_break() {
        let mut rows = vec![
            DcCost { dc_id: "B".into(), flow_cost: 10.0 },
            DcCost { dc_id: "C".into(), flow_cost: 30.0 },
            DcCost { dc_id: "A".into(), flow_cost: 10.0 },
        ];
        sort_cost_rows(&mut rows, SortOrder::Desc);
        let ids: Vec<&str> = rows.iter().map(|r| r.dc_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);

        sort_cost_rows(&mut rows, SortOrder::Asc);
        let ids: Vec<&str> = rows.iter().map(|r| r.dc_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_kpi_rows_round_trip_status() {
        let kpis = HeadlineKpis {
            total_transport_cost: 170.0,
            unmet_penalty_cost: 200.0,
            total_cost_with_penalty: 370.0,
            total_units: 170.0,
            total_shipped_units: 150.0,
            unmet_units: 20.0,
            pct_units_on_slow_lanes: 0.0,
            num_dcs: 2,
            num_stores: 2,
            lp_status: "optimal".into(),
        };
        let rows = kpis.to_rows();
        assert_eq!(rows.last().unwrap().value, KpiValue::Text("optimal".into()));
        assert_eq!(HeadlineKpis::from_rows(&rows), kpis);
    }
}
