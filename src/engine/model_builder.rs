// ==========================================
// 配送网络优化系统 - 流模型构建器
// ==========================================
// 职责: 由网络配置构建线性规划
// 变量: x[dc,store] ≥ 0 每条线路一个; u[store] ≥ 0 每个门店一个
// 目标: min Σ cost·x + Σ penalty·u
// 约束: 每个门店 Σ x + u = demand; 每个 DC Σ x ≤ capacity
// ==========================================
// 红线: 变量顺序固定 (线路按 (dc_id, store_id) 升序, 门店按 store_id 升序),
//       提取器按同一布局拆分解向量
// ==========================================

use crate::config::OptimizerConfig;
use crate::domain::network::{Lane, NetworkConfig};
use crate::domain::types::UnmetDemandPolicy;
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// LinearRow - 稀疏约束行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    /// (变量下标, 系数)
    pub coefficients: Vec<(usize, f64)>,
    pub rhs: f64,
    /// 行标签 (门店ID / DC ID),用于日志与错误信息
    pub label: String,
}

impl LinearRow {
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}

// ==========================================
// VariableLayout - 变量布局
// ==========================================
// [0, shipments.len()) 为发运变量, 之后为缺货变量
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    pub shipments: Vec<Lane>,
    pub unmet_stores: Vec<String>,
}

impl VariableLayout {
    pub fn shipment_count(&self) -> usize {
        self.shipments.len()
    }

    pub fn unmet_offset(&self) -> usize {
        self.shipments.len()
    }

    pub fn num_vars(&self) -> usize {
        self.shipments.len() + self.unmet_stores.len()
    }
}

// ==========================================
// FlowModel - 构建完成的线性规划
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct FlowModel {
    pub objective: Vec<f64>,
    pub eq_rows: Vec<LinearRow>,   // 需求平衡 (每门店一行, store_id 升序)
    pub ub_rows: Vec<LinearRow>,   // 产能上限 (每个有线路的 DC 一行, dc_id 升序)
    pub layout: VariableLayout,
    pub store_order: Vec<String>,
    pub policy: UnmetDemandPolicy,
    pub dropped_lanes: usize,      // 因引用未知实体或重复而剔除的线路数
}

impl FlowModel {
    pub fn num_vars(&self) -> usize {
        self.layout.num_vars()
    }

    /// 用原始解向量计算目标值
    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(values.iter())
            .map(|(c, v)| c * v)
            .sum()
    }
}

// ==========================================
// FlowModelBuilder
// ==========================================
// 带惩罚 / 不允许缺货 共用同一条构建路径,由 UnmetDemandPolicy 参数化
pub struct FlowModelBuilder {
    policy: UnmetDemandPolicy,
}

impl FlowModelBuilder {
    pub fn new(policy: UnmetDemandPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.unmet_policy)
    }

    /// 构建线性规划
    ///
    /// # 说明
    /// - 引用未知 DC / 门店的线路在建模前剔除 (不报错)
    /// - 同一 (DC, 门店) 的重复线路只保留排序后的第一条
    /// - 没有任何线路的门店只能通过 u = demand 满足
    /// - 没有线路的 DC 不生成产能行
    pub fn build(&self, network: &NetworkConfig) -> FlowModel {
        // 1. 门店顺序 (去重)
        let mut store_order: Vec<String> = Vec::with_capacity(network.stores.len());
        let mut demand_by_store: BTreeMap<&str, f64> = BTreeMap::new();
        for store in network.stores_sorted() {
            if demand_by_store.contains_key(store.store_id.as_str()) {
                tracing::warn!(store_id = %store.store_id, "门店ID重复,仅保留第一条");
                continue;
            }
            demand_by_store.insert(store.store_id.as_str(), store.weekly_demand);
            store_order.push(store.store_id.clone());
        }

        // 2. DC 产能 (去重)
        let mut capacity_by_dc: BTreeMap<&str, f64> = BTreeMap::new();
        for dc in network.dcs_sorted() {
            if capacity_by_dc.contains_key(dc.dc_id.as_str()) {
                tracing::warn!(dc_id = %dc.dc_id, "DC ID重复,仅保留第一条");
                continue;
            }
            capacity_by_dc.insert(dc.dc_id.as_str(), dc.weekly_capacity);
        }

        // 3. 可行线路: 可解析 + 去重 + 排序
        let mut sorted_lanes: Vec<&Lane> = network.lanes.iter().collect();
        sorted_lanes.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut shipments: Vec<Lane> = Vec::with_capacity(sorted_lanes.len());
        let mut unresolved = 0usize;
        let mut duplicated = 0usize;
        for lane in sorted_lanes {
            if !capacity_by_dc.contains_key(lane.dc_id.as_str())
                || !demand_by_store.contains_key(lane.store_id.as_str())
            {
                unresolved += 1;
                continue;
            }
            if !seen.insert(lane.key()) {
                duplicated += 1;
                continue;
            }
            shipments.push(lane.clone());
        }
        if unresolved > 0 {
            tracing::warn!(unresolved, "线路引用了未知 DC 或门店,已在建模前剔除");
        }
        if duplicated > 0 {
            tracing::warn!(duplicated, "存在重复线路,已保留首条");
        }

        // 4. 缺货变量
        let unmet_stores: Vec<String> = if self.policy.allows_unmet() {
            store_order.clone()
        } else {
            Vec::new()
        };
        let layout = VariableLayout {
            shipments,
            unmet_stores,
        };

        // 5. 目标向量
        let mut objective: Vec<f64> = layout.shipments.iter().map(|l| l.cost_per_unit).collect();
        if let Some(penalty) = self.policy.penalty() {
            objective.extend(std::iter::repeat(penalty).take(layout.unmet_stores.len()));
        }

        // 6. 需求平衡约束 (每门店一行)
        let store_row: BTreeMap<&str, usize> = store_order
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let mut eq_rows: Vec<LinearRow> = store_order
            .iter()
            .map(|s| LinearRow {
                coefficients: Vec::new(),
                rhs: demand_by_store.get(s.as_str()).copied().unwrap_or(0.0),
                label: s.clone(),
            })
            .collect();
        for (var_idx, lane) in layout.shipments.iter().enumerate() {
            if let Some(&row) = store_row.get(lane.store_id.as_str()) {
                eq_rows[row].coefficients.push((var_idx, 1.0));
            }
        }
        for (k, store_id) in layout.unmet_stores.iter().enumerate() {
            if let Some(&row) = store_row.get(store_id.as_str()) {
                eq_rows[row].coefficients.push((layout.unmet_offset() + k, 1.0));
            }
        }

        // 7. 产能约束 (每个有线路的 DC 一行)
        let mut ub_by_dc: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
        for (var_idx, lane) in layout.shipments.iter().enumerate() {
            ub_by_dc
                .entry(lane.dc_id.as_str())
                .or_default()
                .push((var_idx, 1.0));
        }
        let ub_rows: Vec<LinearRow> = ub_by_dc
            .into_iter()
            .map(|(dc_id, coefficients)| LinearRow {
                coefficients,
                rhs: capacity_by_dc.get(dc_id).copied().unwrap_or(0.0),
                label: dc_id.to_string(),
            })
            .collect();

        tracing::debug!(
            shipment_vars = layout.shipment_count(),
            unmet_vars = layout.unmet_stores.len(),
            eq_rows = eq_rows.len(),
            ub_rows = ub_rows.len(),
            policy = %self.policy,
            "流模型构建完成"
        );

        FlowModel {
            objective,
            eq_rows,
            ub_rows,
            layout,
            store_order,
            policy: self.policy,
            dropped_lanes: unresolved + duplicated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{DistributionCenter, Store};

    fn two_by_two() -> NetworkConfig {
        NetworkConfig::baseline(
            vec![
                DistributionCenter::new("DC2", 50.0),
                DistributionCenter::new("DC1", 100.0),
            ],
            vec![Store::new("S2", 90.0, "West"), Store::new("S1", 80.0, "East")],
            vec![
                Lane::new("DC2", "S2", 1.0, 1.0),
                Lane::new("DC1", "S1", 1.0, 1.0),
                Lane::new("DC2", "S1", 3.0, 1.0),
                Lane::new("DC1", "S2", 2.0, 3.0),
            ],
        )
    }

    #[test]
    fn test_variable_order_and_objective() {
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&two_by_two());

        let keys: Vec<(&str, &str)> = model.layout.shipments.iter().map(|l| l.key()).collect();
        assert_eq!(
            keys,
            vec![("DC1", "S1"), ("DC1", "S2"), ("DC2", "S1"), ("DC2", "S2")]
        );
        assert_eq!(model.layout.unmet_stores, vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(model.objective, vec![1.0, 2.0, 3.0, 1.0, 10.0, 10.0]);
        assert_eq!(model.num_vars(), 6);
    }

    #[test]
    fn test_constraint_rows() {
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&two_by_two());

        assert_eq!(model.eq_rows.len(), 2);
        assert_eq!(model.eq_rows[0].label, "S1");
        assert_eq!(model.eq_rows[0].rhs, 80.0);
        assert_eq!(model.eq_rows[0].coefficients, vec![(0, 1.0), (2, 1.0), (4, 1.0)]);
        assert_eq!(model.eq_rows[1].coefficients, vec![(1, 1.0), (3, 1.0), (5, 1.0)]);

        assert_eq!(model.ub_rows.len(), 2);
        assert_eq!(model.ub_rows[0].label, "DC1");
        assert_eq!(model.ub_rows[0].rhs, 100.0);
        assert_eq!(model.ub_rows[0].coefficients, vec![(0, 1.0), (1, 1.0)]);
        assert_eq!(model.ub_rows[1].rhs, 50.0);
    }

    #[test]
    fn test_disallowed_policy_has_no_unmet_vars() {
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Disallowed).build(&two_by_two());
        assert_eq!(model.num_vars(), 4);
        assert_eq!(model.objective.len(), 4);
        assert!(model.eq_rows.iter().all(|r| r.coefficients.iter().all(|(i, _)| *i < 4)));
    }

    #[test]
    fn test_dangling_and_duplicate_lanes_are_dropped() {
        let mut network = two_by_two();
        network.lanes.push(Lane::new("DC_GHOST", "S1", 0.1, 1.0));
        network.lanes.push(Lane::new("DC1", "S_GHOST", 0.1, 1.0));
        network.lanes.push(Lane::new("DC1", "S1", 9.0, 1.0));

        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        assert_eq!(model.layout.shipment_count(), 4);
        assert_eq!(model.dropped_lanes, 3);
    }

    #[test]
    fn test_store_without_lanes_only_has_unmet_var() {
        let mut network = two_by_two();
        network.stores.push(Store::new("S3", 40.0, "North"));

        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        let row = model.eq_rows.iter().find(|r| r.label == "S3").unwrap();
        assert_eq!(row.coefficients.len(), 1);
        assert!(row.coefficients[0].0 >= model.layout.unmet_offset());
        assert_eq!(row.rhs, 40.0);
    }

    #[test]
    fn test_dc_without_lanes_has_no_capacity_row() {
        let mut network = two_by_two();
        network.dcs.push(DistributionCenter::new("DC3", 500.0));

        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        assert!(model.ub_rows.iter().all(|r| r.label != "DC3"));
    }

    #[test]
    fn test_evaluate_objective() {
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&two_by_two());
        let values = vec![80.0, 20.0, 0.0, 50.0, 0.0, 20.0];
        assert_eq!(model.evaluate_objective(&values), 370.0);
    }
}
