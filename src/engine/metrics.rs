// ==========================================
// 配送网络优化系统 - 派生指标引擎
// ==========================================
// 输入: 一次求解的 Flow / UnmetDemand + 网络参考数据
// 输出: 利用率、成本汇总、服务门店数、慢线路、头部KPI
// ==========================================
// 红线: 无状态纯函数; 所有累加按 ID 升序进行,结果逐位可复现
// ==========================================

use crate::domain::metrics::{
    sort_cost_rows, DcCost, DcUtilization, DerivedMetrics, HeadlineKpis, RegionCost, SlowLane,
    SlowLaneKpis, StoresServed,
};
use crate::domain::network::NetworkConfig;
use crate::domain::solution::{Flow, UnmetDemand};
use crate::domain::types::{SolveStatus, SortOrder};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// 门店区域缺失时的占位
const UNKNOWN_REGION: &str = "UNKNOWN";

/// 保留两位小数 (对放大值做银行家舍入)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

// ==========================================
// DerivedMetricsBuilder
// ==========================================
pub struct DerivedMetricsBuilder {
    unmet_penalty: f64,
    slow_lane_threshold_days: f64,
}

impl DerivedMetricsBuilder {
    pub fn new(unmet_penalty: f64, slow_lane_threshold_days: f64) -> Self {
        Self {
            unmet_penalty,
            slow_lane_threshold_days,
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 生成全部派生指标
    pub fn build(
        &self,
        flows: &[Flow],
        unmet_demand: &[UnmetDemand],
        network: &NetworkConfig,
        status: SolveStatus,
    ) -> DerivedMetrics {
        // 固定累加顺序: (dc_id, store_id) 升序
        let mut ordered: Vec<&Flow> = flows.iter().collect();
        ordered.sort_by(|a, b| (&a.dc_id, &a.store_id).cmp(&(&b.dc_id, &b.store_id)));

        let dc_utilization = self.dc_utilization(&ordered, network);
        let cost_by_dc = self.cost_by_dc(&ordered, SortOrder::Desc);
        let cost_by_region = self.cost_by_region(&ordered, network, SortOrder::Desc);
        let stores_served_by_dc = self.stores_served(&ordered);
        let (slow_lanes, slow_lane_kpis) = self.slow_lanes(&ordered, network);
        let kpis = self.headline_kpis(&ordered, unmet_demand, network, status, &slow_lane_kpis);

        DerivedMetrics {
            dc_utilization,
            cost_by_dc,
            cost_by_region,
            stores_served_by_dc,
            slow_lanes,
            slow_lane_kpis,
            kpis,
        }
    }

    // ==========================================
    // 利用率
    // ==========================================

    /// 每个 DC 一行 (dc_id 升序),无流量的 DC 为 0%
    fn dc_utilization(&self, ordered: &[&Flow], network: &NetworkConfig) -> Vec<DcUtilization> {
        let mut assigned: BTreeMap<&str, f64> = BTreeMap::new();
        for f in ordered {
            *assigned.entry(f.dc_id.as_str()).or_insert(0.0) += f.units_assigned;
        }

        network
            .unique_dcs()
            .into_iter()
            .map(|dc| {
                let units_assigned = assigned.get(dc.dc_id.as_str()).copied().unwrap_or(0.0);
                let utilization_pct = if dc.weekly_capacity > 0.0 {
                    round2(units_assigned / dc.weekly_capacity * 100.0)
                } else {
                    0.0
                };
                DcUtilization {
                    dc_id: dc.dc_id.clone(),
                    weekly_capacity: dc.weekly_capacity,
                    units_assigned,
                    utilization_pct,
                }
            })
            .collect()
    }

    // ==========================================
    // 成本汇总
    // ==========================================

    /// 按 DC 汇总运费 (只含有流量的 DC)
    pub fn cost_by_dc(&self, ordered: &[&Flow], order: SortOrder) -> Vec<DcCost> {
        let mut by_dc: BTreeMap<&str, f64> = BTreeMap::new();
        for f in ordered {
            *by_dc.entry(f.dc_id.as_str()).or_insert(0.0) += f.flow_cost;
        }
        let mut rows: Vec<DcCost> = by_dc
            .into_iter()
            .map(|(dc_id, flow_cost)| DcCost {
                dc_id: dc_id.to_string(),
                flow_cost,
            })
            .collect();
        sort_cost_rows(&mut rows, order);
        rows
    }

    /// 按门店区域汇总运费
    pub fn cost_by_region(
        &self,
        ordered: &[&Flow],
        network: &NetworkConfig,
        order: SortOrder,
    ) -> Vec<RegionCost> {
        let region_of = network.region_by_store();
        let mut by_region: BTreeMap<&str, f64> = BTreeMap::new();
        for f in ordered {
            let region = region_of
                .get(f.store_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_REGION);
            *by_region.entry(region).or_insert(0.0) += f.flow_cost;
        }
        let mut rows: Vec<RegionCost> = by_region
            .into_iter()
            .map(|(region, flow_cost)| RegionCost {
                region: region.to_string(),
                flow_cost,
            })
            .collect();
        sort_cost_rows(&mut rows, order);
        rows
    }

    /// 每个 DC 服务的不同门店数
    fn stores_served(&self, ordered: &[&Flow]) -> Vec<StoresServed> {
        let mut served: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for f in ordered {
            served
                .entry(f.dc_id.as_str())
                .or_default()
                .insert(f.store_id.as_str());
        }
        served
            .into_iter()
            .map(|(dc_id, stores)| StoresServed {
                dc_id: dc_id.to_string(),
                stores_served: stores.len(),
            })
            .collect()
    }

    // ==========================================
    // 慢线路
    // ==========================================

    /// 时效严格大于阈值的实际流量
    fn slow_lanes(&self, ordered: &[&Flow], network: &NetworkConfig) -> (Vec<SlowLane>, SlowLaneKpis) {
        // 重复线路取排序后的第一条,与建模口径一致
        let mut transit: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        let mut lanes: Vec<_> = network.lanes.iter().collect();
        lanes.sort_by(|a, b| a.key().cmp(&b.key()));
        for lane in lanes {
            transit.entry(lane.key()).or_insert(lane.service_time_days);
        }

        let mut detail: Vec<SlowLane> = ordered
            .iter()
            .filter_map(|f| {
                let days = transit.get(&(f.dc_id.as_str(), f.store_id.as_str())).copied()?;
                (days > self.slow_lane_threshold_days).then(|| SlowLane {
                    dc_id: f.dc_id.clone(),
                    store_id: f.store_id.clone(),
                    service_time_days: days,
                    units_assigned: f.units_assigned,
                })
            })
            .collect();

        let units_on_slow_lanes = SlowLaneKpis::sum_units(&detail);
        let total_shipped_units: f64 = ordered.iter().map(|f| f.units_assigned).sum();
        let pct_units_on_slow_lanes =
            round2(units_on_slow_lanes / total_shipped_units.max(1.0) * 100.0);

        detail.sort_by(|a, b| {
            b.units_assigned
                .partial_cmp(&a.units_assigned)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (&a.dc_id, &a.store_id).cmp(&(&b.dc_id, &b.store_id)))
        });

        let kpis = SlowLaneKpis {
            threshold_days: self.slow_lane_threshold_days,
            slow_lane_count: detail.len(),
            units_on_slow_lanes,
            total_shipped_units,
            pct_units_on_slow_lanes,
        };
        (detail, kpis)
    }

    // ==========================================
    // 头部KPI
    // ==========================================

    fn headline_kpis(
        &self,
        ordered: &[&Flow],
        unmet_demand: &[UnmetDemand],
        network: &NetworkConfig,
        status: SolveStatus,
        slow: &SlowLaneKpis,
    ) -> HeadlineKpis {
        let transport_cost: f64 = ordered.iter().map(|f| f.flow_cost).sum();

        let mut unmet_ordered: Vec<&UnmetDemand> = unmet_demand.iter().collect();
        unmet_ordered.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        let unmet_units: f64 = unmet_ordered.iter().map(|u| u.unmet_units).sum();
        let penalty_cost: f64 = unmet_ordered
            .iter()
            .map(|u| u.unmet_units * self.unmet_penalty)
            .sum();

        HeadlineKpis {
            total_transport_cost: round2(transport_cost),
            unmet_penalty_cost: round2(penalty_cost),
            total_cost_with_penalty: round2(transport_cost + penalty_cost),
            total_units: network.total_demand(),
            total_shipped_units: slow.total_shipped_units,
            unmet_units,
            pct_units_on_slow_lanes: slow.pct_units_on_slow_lanes,
            num_dcs: network.unique_dcs().len(),
            num_stores: network.unique_stores().len(),
            lp_status: status.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{DistributionCenter, Lane, Store};

    fn flow(dc: &str, store: &str, units: f64, cost: f64) -> Flow {
        Flow {
            dc_id: dc.to_string(),
            store_id: store.to_string(),
            units_assigned: units,
            cost_per_unit: cost,
            flow_cost: units * cost,
        }
    }

    fn network() -> NetworkConfig {
        NetworkConfig::baseline(
            vec![
                DistributionCenter::new("DC1", 1000.0),
                DistributionCenter::new("DC2", 600.0),
                DistributionCenter::new("DC3", 0.0),
            ],
            vec![
                Store::new("S1", 500.0, "East"),
                Store::new("S2", 300.0, "West"),
                Store::new("S3", 200.0, "West"),
            ],
            vec![
                Lane::new("DC1", "S1", 1.0, 3.0),
                Lane::new("DC1", "S2", 2.0, 2.0),
                Lane::new("DC2", "S3", 1.5, 1.0),
                Lane::new("DC3", "S3", 0.5, 1.0),
            ],
        )
    }

    fn flows() -> Vec<Flow> {
        vec![
            flow("DC2", "S3", 150.0, 1.5),
            flow("DC1", "S1", 500.0, 1.0),
            flow("DC1", "S2", 300.0, 2.0),
        ]
    }

    fn unmet() -> Vec<UnmetDemand> {
        vec![
            UnmetDemand { store_id: "S1".into(), unmet_units: 0.0 },
            UnmetDemand { store_id: "S2".into(), unmet_units: 0.0 },
            UnmetDemand { store_id: "S3".into(), unmet_units: 50.0 },
        ]
    }

    #[test]
    fn test_utilization_includes_idle_dcs() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        assert_eq!(m.dc_utilization.len(), 3);
        assert_eq!(m.dc_utilization[0].dc_id, "DC1");
        assert_eq!(m.dc_utilization[0].units_assigned, 800.0);
        assert_eq!(m.dc_utilization[0].utilization_pct, 80.0);
        assert_eq!(m.dc_utilization[1].utilization_pct, 25.0);
        assert_eq!(m.dc_utilization[2].units_assigned, 0.0);
        assert_eq!(m.dc_utilization[2].utilization_pct, 0.0);
    }

    #[test]
    fn test_utilization_rounding() {
        let net = NetworkConfig::baseline(
            vec![DistributionCenter::new("DC1", 3.0)],
            vec![Store::new("S1", 1.0, "East")],
            vec![Lane::new("DC1", "S1", 1.0, 1.0)],
        );
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(
            &[flow("DC1", "S1", 1.0, 1.0)],
            &[],
            &net,
            SolveStatus::Optimal,
        );
        assert_eq!(m.dc_utilization[0].utilization_pct, 33.33);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
    }

    #[test]
    fn test_cost_rollups() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        // DC1 = 500 + 600 = 1100, DC2 = 225
        assert_eq!(m.cost_by_dc[0].dc_id, "DC1");
        assert_eq!(m.cost_by_dc[0].flow_cost, 1100.0);
        assert_eq!(m.cost_by_dc[1].flow_cost, 225.0);
        // West = 600 + 225 = 825, East = 500
        assert_eq!(m.cost_by_region[0].region, "West");
        assert_eq!(m.cost_by_region[0].flow_cost, 825.0);
        assert_eq!(m.cost_by_region[1].region, "East");

        let builder = DerivedMetricsBuilder::new(10.0, 2.0);
        let f = flows();
        let ordered: Vec<&Flow> = f.iter().collect();
        let asc = builder.cost_by_region(&ordered, &network(), SortOrder::Asc);
        assert_eq!(asc[0].region, "East");
    }

    #[test]
    fn test_stores_served() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        assert_eq!(m.stores_served_by_dc.len(), 2);
        assert_eq!(m.stores_served_by_dc[0].stores_served, 2);
        assert_eq!(m.stores_served_by_dc[1].stores_served, 1);
    }

    #[test]
    fn test_slow_lane_threshold_is_strict() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        // DC1→S1 为 3.0 天 (慢), DC1→S2 恰为 2.0 天 (不慢)
        assert_eq!(m.slow_lanes.len(), 1);
        assert_eq!(m.slow_lanes[0].store_id, "S1");
        assert_eq!(m.slow_lane_kpis.slow_lane_count, 1);
        assert_eq!(m.slow_lane_kpis.units_on_slow_lanes, 500.0);
        assert_eq!(m.slow_lane_kpis.total_shipped_units, 950.0);
        assert_eq!(m.slow_lane_kpis.pct_units_on_slow_lanes, 52.63);
    }

    #[test]
    fn test_slow_lane_pct_floor_when_nothing_shipped() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&[], &unmet(), &network(), SolveStatus::Optimal);
        assert_eq!(m.slow_lane_kpis.pct_units_on_slow_lanes, 0.0);
        assert_eq!(m.slow_lane_kpis.total_shipped_units, 0.0);
        assert!(m.cost_by_dc.is_empty());
        assert_eq!(m.dc_utilization.len(), 3);
    }

    #[test]
    fn test_headline_kpis() {
        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        let k = &m.kpis;
        assert_eq!(k.total_transport_cost, 1325.0);
        assert_eq!(k.unmet_penalty_cost, 500.0);
        assert_eq!(k.total_cost_with_penalty, 1825.0);
        assert_eq!(k.total_units, 1000.0);
        assert_eq!(k.unmet_units, 50.0);
        assert_eq!(k.num_dcs, 3);
        assert_eq!(k.num_stores, 3);
        assert_eq!(k.lp_status, "optimal");
    }

    #[test]
    fn test_duplicate_ids_counted_once() {
        let mut net = network();
        net.dcs.push(DistributionCenter::new("DC1", 5.0));
        net.stores.push(Store::new("S1", 500.0, "East"));

        let m = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows(), &unmet(), &net, SolveStatus::Optimal);
        assert_eq!(m.kpis.num_dcs, 3);
        assert_eq!(m.kpis.num_stores, 3);
        assert_eq!(m.kpis.total_units, 1000.0);
        assert_eq!(m.dc_utilization.len(), 3);
        assert_eq!(m.dc_utilization[0].weekly_capacity, 1000.0);
    }

    #[test]
    fn test_build_is_idempotent_and_order_independent() {
        let builder = DerivedMetricsBuilder::new(10.0, 2.0);
        let a = builder.build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        let b = builder.build(&flows(), &unmet(), &network(), SolveStatus::Optimal);
        assert_eq!(a, b);

        let mut reversed = flows();
        reversed.reverse();
        let c = builder.build(&reversed, &unmet(), &network(), SolveStatus::Optimal);
        assert_eq!(a, c);
    }
}
