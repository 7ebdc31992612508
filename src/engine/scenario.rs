// ==========================================
// 配送网络优化系统 - 情景变换器
// ==========================================
// 职责: 以 (NetworkConfig, ScenarioLevers) 为输入,返回新的 NetworkConfig
// 红线: 纯函数,不修改输入; 新配置 revision = parent + 1
// ==========================================

use crate::domain::network::NetworkConfig;
use crate::domain::scenario::ScenarioLevers;
use tracing::{info, warn};

pub struct ScenarioMutator;

impl ScenarioMutator {
    /// 应用情景杠杆
    ///
    /// # 规则
    /// - DC 产能 *= dc_capacity_mult[dc_id] (缺省 1.0)
    /// - 门店需求 *= region_demand_mult[region] (缺省 1.0)
    /// - 线路原样保留
    /// - 不匹配任何实体的键仅告警,不报错
    pub fn apply(base: &NetworkConfig, levers: &ScenarioLevers) -> NetworkConfig {
        Self::warn_suspicious_levers(base, levers);

        let mut next = base.clone();
        next.revision = base.revision + 1;
        next.parent_revision = Some(base.revision);

        for dc in next.dcs.iter_mut() {
            if let Some(mult) = levers.dc_capacity_mult.get(&dc.dc_id) {
                dc.weekly_capacity *= mult;
            }
        }
        for store in next.stores.iter_mut() {
            if let Some(mult) = levers.region_demand_mult.get(&store.region) {
                store.weekly_demand *= mult;
            }
        }

        let negative_capacity = next.dcs.iter().filter(|d| d.weekly_capacity < 0.0).count();
        let negative_demand = next.stores.iter().filter(|s| s.weekly_demand < 0.0).count();
        if negative_capacity > 0 || negative_demand > 0 {
            warn!(
                negative_capacity,
                negative_demand,
                "情景结果含负值,未做截断"
            );
        }

        info!(
            parent_revision = base.revision,
            revision = next.revision,
            dc_levers = levers.dc_capacity_mult.len(),
            region_levers = levers.region_demand_mult.len(),
            total_capacity = next.total_capacity(),
            total_demand = next.total_demand(),
            "情景杠杆已应用"
        );

        next
    }

    fn warn_suspicious_levers(base: &NetworkConfig, levers: &ScenarioLevers) {
        let regions = base.regions();
        for (dc_id, mult) in &levers.dc_capacity_mult {
            if base.find_dc(dc_id).is_none() {
                warn!(dc_id = %dc_id, "产能杠杆未匹配任何 DC");
            }
            if *mult <= 0.0 {
                warn!(dc_id = %dc_id, mult, "产能乘数非正");
            }
        }
        for (region, mult) in &levers.region_demand_mult {
            if !regions.contains(region.as_str()) {
                warn!(region = %region, "需求杠杆未匹配任何区域");
            }
            if *mult <= 0.0 {
                warn!(region = %region, mult, "需求乘数非正");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{DistributionCenter, Lane, Store};

    fn base() -> NetworkConfig {
        NetworkConfig::baseline(
            vec![
                DistributionCenter::new("DC1", 100.0),
                DistributionCenter::new("DC2", 200.0),
            ],
            vec![
                Store::new("S1", 50.0, "East"),
                Store::new("S2", 80.0, "West"),
                Store::new("S3", 20.0, "West"),
            ],
            vec![Lane::new("DC1", "S1", 1.0, 1.0)],
        )
    }

    #[test]
    fn test_revision_increments() {
        let b = base();
        let next = ScenarioMutator::apply(&b, &ScenarioLevers::new());
        assert_eq!(next.revision, 1);
        assert_eq!(next.parent_revision, Some(0));
        assert_eq!(next.dcs, b.dcs);
        assert_eq!(next.stores, b.stores);

        let again = ScenarioMutator::apply(&next, &ScenarioLevers::new());
        assert_eq!(again.revision, 2);
        assert_eq!(again.parent_revision, Some(1));
    }

    #[test]
    fn test_capacity_and_region_multipliers() {
        let levers = ScenarioLevers::new()
            .with_dc_capacity("DC1", 0.0)
            .with_region_demand("West", 1.5);
        let b = base();
        let next = ScenarioMutator::apply(&b, &levers);

        assert_eq!(next.find_dc("DC1").unwrap().weekly_capacity, 0.0);
        assert_eq!(next.find_dc("DC2").unwrap().weekly_capacity, 200.0);
        assert_eq!(next.find_store("S1").unwrap().weekly_demand, 50.0);
        assert_eq!(next.find_store("S2").unwrap().weekly_demand, 120.0);
        assert_eq!(next.find_store("S3").unwrap().weekly_demand, 30.0);
        assert_eq!(next.lanes, b.lanes);

        // 输入不变
        assert_eq!(b.find_dc("DC1").unwrap().weekly_capacity, 100.0);
    }

    #[test]
    fn test_unmatched_keys_leave_network_unchanged() {
        let levers = ScenarioLevers::new()
            .with_dc_capacity("DC9", 0.5)
            .with_region_demand("North", 2.0);
        let b = base();
        let next = ScenarioMutator::apply(&b, &levers);
        assert_eq!(next.dcs, b.dcs);
        assert_eq!(next.stores, b.stores);
    }
}
