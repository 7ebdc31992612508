// ==========================================
// 配送网络优化系统 - 解提取器
// ==========================================
// 职责: 把原始解向量拆回具名流量与缺货数量
// 规则:
// - 发运变量 > 容差 才生成 Flow, flow_cost = units * unit_cost
// - 每个门店无条件输出一行 UnmetDemand (含 0)
// - ≤ 容差的值 (含求解器产生的微小负值) 一律记为 0
// ==========================================

use crate::domain::solution::{Flow, UnmetDemand};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::model_builder::FlowModel;
use crate::engine::solver::RawSolution;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSolution {
    pub flows: Vec<Flow>,
    pub unmet_demand: Vec<UnmetDemand>,
}

pub struct SolutionExtractor {
    zero_tolerance: f64,
}

impl SolutionExtractor {
    pub fn new(zero_tolerance: f64) -> Self {
        Self { zero_tolerance }
    }

    fn denoise(&self, value: f64) -> f64 {
        if value > self.zero_tolerance {
            value
        } else {
            0.0
        }
    }

    pub fn extract(&self, model: &FlowModel, raw: &RawSolution) -> EngineResult<ExtractedSolution> {
        let expected = model.num_vars();
        if raw.values.len() != expected {
            return Err(EngineError::LayoutMismatch {
                expected,
                actual: raw.values.len(),
            });
        }

        let (ship_values, unmet_values) = raw.values.split_at(model.layout.unmet_offset());

        let flows: Vec<Flow> = model
            .layout
            .shipments
            .iter()
            .zip(ship_values.iter())
            .filter(|(_, qty)| **qty > self.zero_tolerance)
            .map(|(lane, qty)| Flow {
                dc_id: lane.dc_id.clone(),
                store_id: lane.store_id.clone(),
                units_assigned: *qty,
                cost_per_unit: lane.cost_per_unit,
                flow_cost: *qty * lane.cost_per_unit,
            })
            .collect();

        // 不允许缺货时没有 u 变量,仍按门店输出 0 行
        let unmet_demand: Vec<UnmetDemand> = if model.layout.unmet_stores.is_empty() {
            model
                .store_order
                .iter()
                .map(|s| UnmetDemand {
                    store_id: s.clone(),
                    unmet_units: 0.0,
                })
                .collect()
        } else {
            model
                .layout
                .unmet_stores
                .iter()
                .zip(unmet_values.iter())
                .map(|(s, u)| UnmetDemand {
                    store_id: s.clone(),
                    unmet_units: self.denoise(*u),
                })
                .collect()
        };

        tracing::debug!(
            flows = flows.len(),
            discarded = model.layout.shipment_count() - flows.len(),
            "解提取完成"
        );

        Ok(ExtractedSolution {
            flows,
            unmet_demand,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{DistributionCenter, Lane, NetworkConfig, Store};
    use crate::domain::types::UnmetDemandPolicy;
    use crate::engine::model_builder::FlowModelBuilder;

    fn model(policy: UnmetDemandPolicy) -> FlowModel {
        let network = NetworkConfig::baseline(
            vec![DistributionCenter::new("DC1", 100.0)],
            vec![Store::new("S1", 30.0, "East"), Store::new("S2", 20.0, "West")],
            vec![
                Lane::new("DC1", "S1", 2.0, 1.0),
                Lane::new("DC1", "S2", 4.0, 3.0),
            ],
        );
        FlowModelBuilder::new(policy).build(&network)
    }

    #[test]
    fn test_noise_flows_are_discarded() {
        let model = model(UnmetDemandPolicy::Penalized(10.0));
        let raw = RawSolution {
            values: vec![30.0, 5e-7, 0.0, 20.0],
            objective_value: 260.0,
        };
        let out = SolutionExtractor::new(1e-6).extract(&model, &raw).unwrap();

        assert_eq!(out.flows.len(), 1);
        assert_eq!(out.flows[0].store_id, "S1");
        assert_eq!(out.flows[0].flow_cost, 60.0);
        assert_eq!(out.unmet_demand.len(), 2);
        assert_eq!(out.unmet_demand[0].unmet_units, 0.0);
        assert_eq!(out.unmet_demand[1].unmet_units, 20.0);
    }

    #[test]
    fn test_negative_noise_in_unmet_is_zero() {
        let model = model(UnmetDemandPolicy::Penalized(10.0));
        let raw = RawSolution {
            values: vec![30.0, 20.0, -3e-9, 2e-7],
            objective_value: 140.0,
        };
        let out = SolutionExtractor::new(1e-6).extract(&model, &raw).unwrap();
        assert!(out.unmet_demand.iter().all(|u| u.unmet_units == 0.0));
    }

    #[test]
    fn test_disallowed_policy_emits_zero_unmet_rows() {
        let model = model(UnmetDemandPolicy::Disallowed);
        let raw = RawSolution {
            values: vec![30.0, 20.0],
            objective_value: 140.0,
        };
        let out = SolutionExtractor::new(1e-6).extract(&model, &raw).unwrap();
        assert_eq!(out.flows.len(), 2);
        assert_eq!(out.unmet_demand.len(), 2);
        assert!(out.unmet_demand.iter().all(|u| u.unmet_units == 0.0));
    }

    #[test]
    fn test_length_mismatch() {
        let model = model(UnmetDemandPolicy::Penalized(10.0));
        let raw = RawSolution {
            values: vec![1.0],
            objective_value: 0.0,
        };
        let err = SolutionExtractor::new(1e-6).extract(&model, &raw).unwrap_err();
        assert!(matches!(err, EngineError::LayoutMismatch { expected: 4, actual: 1 }));
    }
}
