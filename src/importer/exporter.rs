// ==========================================
// 配送网络优化系统 - 结果导出
// ==========================================
// 输出: 每个数据集一个 CSV,列名与下游报表约定一致
// ==========================================

use crate::domain::metrics::KpiValue;
use crate::domain::solution::SolutionSnapshot;
use crate::importer::error::{ImportError, ImportResult};
use csv::Writer;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 导出文件名
pub mod file_names {
    pub const OPTIMAL_FLOWS: &str = "optimal_flows.csv";
    pub const UNMET_DEMAND: &str = "unmet_demand.csv";
    pub const DC_UTILIZATION: &str = "dc_utilization.csv";
    pub const COST_BY_DC: &str = "cost_by_dc.csv";
    pub const COST_BY_REGION: &str = "cost_by_region.csv";
    pub const STORES_SERVED_BY_DC: &str = "stores_served_by_dc.csv";
    pub const SLOW_LANES_DETAIL: &str = "slow_lanes_detail.csv";
    pub const SLOW_LANES_KPIS: &str = "slow_lanes_kpis.csv";
    pub const KPI_SUMMARY: &str = "kpi_summary.csv";
}

// ===== 行结构 (列名即 CSV 表头) =====

#[derive(Serialize)]
struct FlowRow<'a> {
    dc_id: &'a str,
    store_id: &'a str,
    units_assigned: f64,
    cost_per_unit_usd: f64,
    flow_cost_usd: f64,
}

#[derive(Serialize)]
struct UnmetRow<'a> {
    store_id: &'a str,
    unmet_units: f64,
}

#[derive(Serialize)]
struct UtilizationRow<'a> {
    dc_id: &'a str,
    weekly_capacity: f64,
    units_assigned: f64,
    utilization_pct: f64,
}

#[derive(Serialize)]
struct DcCostRow<'a> {
    dc_id: &'a str,
    flow_cost_usd: f64,
}

#[derive(Serialize)]
struct RegionCostRow<'a> {
    region: &'a str,
    flow_cost_usd: f64,
}

#[derive(Serialize)]
struct StoresServedRow<'a> {
    dc_id: &'a str,
    stores_served: usize,
}

#[derive(Serialize)]
struct SlowLaneRow<'a> {
    dc_id: &'a str,
    store_id: &'a str,
    service_time_days: f64,
    units_assigned: f64,
}

#[derive(Serialize)]
struct MetricRow<'a> {
    metric: &'a str,
    value: String,
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> ImportResult<()> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
    Ok(())
}

/// 空数据集也需要表头
fn write_header_only(path: &Path, headers: &[&str]) -> ImportResult<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(headers)?;
    writer
        .flush()
        .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
    Ok(())
}

fn write_dataset<T: Serialize>(path: &Path, headers: &[&str], rows: Vec<T>) -> ImportResult<()> {
    if rows.is_empty() {
        write_header_only(path, headers)
    } else {
        write_csv(path, rows)
    }
}

// ==========================================
// SnapshotExporter
// ==========================================
pub struct SnapshotExporter;

impl SnapshotExporter {
    /// 导出一代快照的全部数据集
    ///
    /// # 返回
    /// 写出的文件路径 (固定顺序)
    pub fn export(snapshot: &SolutionSnapshot, out_dir: impl AsRef<Path>) -> ImportResult<Vec<PathBuf>> {
        use file_names::*;
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir).map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        let metrics = &snapshot.metrics;
        let mut written = Vec::new();

        let path = out_dir.join(OPTIMAL_FLOWS);
        write_dataset(
            &path,
            &["dc_id", "store_id", "units_assigned", "cost_per_unit_usd", "flow_cost_usd"],
            snapshot
                .flows
                .iter()
                .map(|f| FlowRow {
                    dc_id: &f.dc_id,
                    store_id: &f.store_id,
                    units_assigned: f.units_assigned,
                    cost_per_unit_usd: f.cost_per_unit,
                    flow_cost_usd: f.flow_cost,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(UNMET_DEMAND);
        write_dataset(
            &path,
            &["store_id", "unmet_units"],
            snapshot
                .unmet_demand
                .iter()
                .map(|u| UnmetRow {
                    store_id: &u.store_id,
                    unmet_units: u.unmet_units,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(DC_UTILIZATION);
        write_dataset(
            &path,
            &["dc_id", "weekly_capacity", "units_assigned", "utilization_pct"],
            metrics
                .dc_utilization
                .iter()
                .map(|d| UtilizationRow {
                    dc_id: &d.dc_id,
                    weekly_capacity: d.weekly_capacity,
                    units_assigned: d.units_assigned,
                    utilization_pct: d.utilization_pct,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(COST_BY_DC);
        write_dataset(
            &path,
            &["dc_id", "flow_cost_usd"],
            metrics
                .cost_by_dc
                .iter()
                .map(|c| DcCostRow {
                    dc_id: &c.dc_id,
                    flow_cost_usd: c.flow_cost,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(COST_BY_REGION);
        write_dataset(
            &path,
            &["region", "flow_cost_usd"],
            metrics
                .cost_by_region
                .iter()
                .map(|c| RegionCostRow {
                    region: &c.region,
                    flow_cost_usd: c.flow_cost,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(STORES_SERVED_BY_DC);
        write_dataset(
            &path,
            &["dc_id", "stores_served"],
            metrics
                .stores_served_by_dc
                .iter()
                .map(|s| StoresServedRow {
                    dc_id: &s.dc_id,
                    stores_served: s.stores_served,
                })
                .collect(),
        )?;
        written.push(path);

        let path = out_dir.join(SLOW_LANES_DETAIL);
        write_dataset(
            &path,
            &["dc_id", "store_id", "service_time_days", "units_assigned"],
            metrics
                .slow_lanes
                .iter()
                .map(|s| SlowLaneRow {
                    dc_id: &s.dc_id,
                    store_id: &s.store_id,
                    service_time_days: s.service_time_days,
                    units_assigned: s.units_assigned,
                })
                .collect(),
        )?;
        written.push(path);

        let slow = &metrics.slow_lane_kpis;
        let path = out_dir.join(SLOW_LANES_KPIS);
        write_csv(
            &path,
            [
                ("threshold_days", KpiValue::Number(slow.threshold_days)),
                ("slow_lane_count", KpiValue::Number(slow.slow_lane_count as f64)),
                ("units_on_slow_lanes", KpiValue::Number(slow.units_on_slow_lanes)),
                ("total_shipped_units", KpiValue::Number(slow.total_shipped_units)),
                ("pct_units_on_slow_lanes", KpiValue::Number(slow.pct_units_on_slow_lanes)),
            ]
            .iter()
            .map(|(metric, value)| MetricRow {
                metric,
                value: value.to_string(),
            }),
        )?;
        written.push(path);

        let path = out_dir.join(KPI_SUMMARY);
        let kpi_rows = metrics.kpis.to_rows();
        write_csv(
            &path,
            kpi_rows.iter().map(|r| MetricRow {
                metric: &r.metric,
                value: r.value.to_string(),
            }),
        )?;
        written.push(path);

        info!(
            generation = snapshot.generation,
            dir = %out_dir.display(),
            files = written.len(),
            "结果数据集已导出"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{DerivedMetrics, HeadlineKpis, SlowLaneKpis};
    use crate::domain::solution::{Flow, UnmetDemand};
    use crate::domain::types::{SolveStatus, UnmetDemandPolicy};
    use chrono::Utc;

    fn snapshot() -> SolutionSnapshot {
        SolutionSnapshot {
            snapshot_id: "snap-1".to_string(),
            generation: 1,
            network_revision: 0,
            status: SolveStatus::Optimal,
            unmet_policy: UnmetDemandPolicy::Penalized(10.0),
            objective_value: 80.0,
            flows: vec![Flow {
                dc_id: "DC1".to_string(),
                store_id: "S1".to_string(),
                units_assigned: 40.0,
                cost_per_unit: 2.0,
                flow_cost: 80.0,
            }],
            unmet_demand: vec![UnmetDemand {
                store_id: "S1".to_string(),
                unmet_units: 0.0,
            }],
            metrics: DerivedMetrics {
                dc_utilization: vec![],
                cost_by_dc: vec![],
                cost_by_region: vec![],
                stores_served_by_dc: vec![],
                slow_lanes: vec![],
                slow_lane_kpis: SlowLaneKpis {
                    threshold_days: 2.0,
                    slow_lane_count: 0,
                    units_on_slow_lanes: 0.0,
                    total_shipped_units: 40.0,
                    pct_units_on_slow_lanes: 0.0,
                },
                kpis: HeadlineKpis {
                    total_transport_cost: 80.0,
                    unmet_penalty_cost: 0.0,
                    total_cost_with_penalty: 80.0,
                    total_units: 40.0,
                    total_shipped_units: 40.0,
                    unmet_units: 0.0,
                    pct_units_on_slow_lanes: 0.0,
                    num_dcs: 1,
                    num_stores: 1,
                    lp_status: "optimal".to_string(),
                },
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_export_writes_every_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let files = SnapshotExporter::export(&snapshot(), dir.path()).unwrap();
        assert_eq!(files.len(), 9);
        assert!(files.iter().all(|p| p.exists()));

        let flows = std::fs::read_to_string(dir.path().join(file_names::OPTIMAL_FLOWS)).unwrap();
        let mut lines = flows.lines();
        assert_eq!(
            lines.next(),
            Some("dc_id,store_id,units_assigned,cost_per_unit_usd,flow_cost_usd")
        );
        assert_eq!(lines.next(), Some("DC1,S1,40.0,2.0,80.0"));

        // 空数据集只有表头
        let slow = std::fs::read_to_string(dir.path().join(file_names::SLOW_LANES_DETAIL)).unwrap();
        assert_eq!(slow.trim(), "dc_id,store_id,service_time_days,units_assigned");

        let kpi = std::fs::read_to_string(dir.path().join(file_names::KPI_SUMMARY)).unwrap();
        assert!(kpi.contains("lp_status,optimal"));
        assert!(kpi.contains("total_transport_cost_usd,80"));
    }
}
