// ==========================================
// 配送网络优化系统 - 情景对比
// ==========================================
// 输入: 基线与情景两代快照的头部KPI
// 输出: 逐项数值差异 (current - baseline)
// ==========================================

use crate::domain::metrics::{HeadlineKpis, KpiValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDelta {
    pub metric: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
    /// 基线为 0 时无意义,置为 None
    pub delta_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiComparison {
    pub baseline_generation: u64,
    pub current_generation: u64,
    pub deltas: Vec<KpiDelta>,
}

impl KpiComparison {
    /// 逐项比较数值型 KPI (文本型 KPI 如 lp_status 跳过)
    pub fn between(
        baseline_generation: u64,
        baseline: &HeadlineKpis,
        current_generation: u64,
        current: &HeadlineKpis,
    ) -> Self {
        let deltas = baseline
            .to_rows()
            .into_iter()
            .zip(current.to_rows())
            .filter_map(|(b, c)| match (&b.value, &c.value) {
                (KpiValue::Number(bv), KpiValue::Number(cv)) => {
                    let delta = cv - bv;
                    Some(KpiDelta {
                        metric: b.metric,
                        baseline: *bv,
                        current: *cv,
                        delta,
                        delta_pct: (*bv != 0.0).then(|| delta / bv * 100.0),
                    })
                }
                _ => None,
            })
            .collect();

        Self {
            baseline_generation,
            current_generation,
            deltas,
        }
    }

    pub fn get(&self, metric: &str) -> Option<&KpiDelta> {
        self.deltas.iter().find(|d| d.metric == metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::metric_names;

    fn kpis(transport: f64, unmet: f64) -> HeadlineKpis {
        HeadlineKpis {
            total_transport_cost: transport,
            unmet_penalty_cost: unmet * 10.0,
            total_cost_with_penalty: transport + unmet * 10.0,
            total_units: 170.0,
            total_shipped_units: 170.0 - unmet,
            unmet_units: unmet,
            pct_units_on_slow_lanes: 0.0,
            num_dcs: 2,
            num_stores: 2,
            lp_status: "optimal".to_string(),
        }
    }

    #[test]
    fn test_numeric_deltas() {
        let cmp = KpiComparison::between(1, &kpis(170.0, 20.0), 2, &kpis(150.0, 40.0));
        assert_eq!(cmp.deltas.len(), 9);
        assert!(cmp.get(metric_names::LP_STATUS).is_none());

        let transport = cmp.get(metric_names::TOTAL_TRANSPORT_COST).unwrap();
        assert_eq!(transport.delta, -20.0);
        let unmet = cmp.get(metric_names::UNMET_UNITS).unwrap();
        assert_eq!(unmet.delta, 20.0);
        assert_eq!(unmet.delta_pct, Some(100.0));

        let slow = cmp.get(metric_names::PCT_UNITS_ON_SLOW_LANES).unwrap();
        assert_eq!(slow.delta_pct, None);
    }
}
