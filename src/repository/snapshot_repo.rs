// ==========================================
// 配送网络优化系统 - 解快照仓储
// ==========================================
// 表: solution_generation + 按 generation 分区的各输出数据集
// 红线: 一代快照在单个事务内整体写入; 不做增量追加
// 红线: 读取一律指定 generation,不存在"当前解"的缓存
// ==========================================

use crate::domain::metrics::{
    DcCost, DcUtilization, DerivedMetrics, HeadlineKpis, KpiRow, KpiValue, RegionCost, SlowLane,
    SlowLaneKpis, StoresServed,
};
use crate::domain::solution::{Flow, SolutionSnapshot, UnmetDemand};
use crate::domain::types::{SolveStatus, SortOrder, UnmetDemandPolicy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 一代快照的头信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub generation: u64,
    pub snapshot_id: String,
    pub network_revision: u64,
    pub status: SolveStatus,
    pub unmet_policy: UnmetDemandPolicy,
    pub objective_value: f64,
    pub slow_lane_threshold_days: f64,
    pub created_at: DateTime<Utc>,
}

/// SQL 中的排序方向
fn sql_order(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

/// LIMIT 参数 (None 表示不限)
fn sql_limit(top: Option<usize>) -> i64 {
    top.map(|n| n as i64).unwrap_or(-1)
}

fn kpi_value_from_text(raw: String) -> KpiValue {
    match raw.parse::<f64>() {
        Ok(v) => KpiValue::Number(v),
        Err(_) => KpiValue::Text(raw),
    }
}

// ==========================================
// SnapshotRepository - 解快照仓储
// ==========================================
pub struct SnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 代号
    // ==========================================

    /// 最新一代 (无任何快照时为 None)
    pub fn latest_generation(&self) -> RepositoryResult<Option<u64>> {
        let conn = self.get_conn()?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(generation) FROM solution_generation", [], |row| {
                row.get(0)
            })?;
        Ok(max.map(|g| g as u64))
    }

    /// 下一代代号 (从 1 开始,严格递增)
    pub fn next_generation(&self) -> RepositoryResult<u64> {
        Ok(self.latest_generation()?.map(|g| g + 1).unwrap_or(1))
    }

    pub fn generation_exists(&self, generation: u64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT generation FROM solution_generation WHERE generation = ?1",
                [generation as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn ensure_generation(&self, generation: u64) -> RepositoryResult<()> {
        if self.generation_exists(generation)? {
            Ok(())
        } else {
            Err(RepositoryError::not_found("SolutionSnapshot", generation))
        }
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 整体写入一代快照
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 该 generation 已存在
    pub fn save(&self, snapshot: &SolutionSnapshot) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let generation = snapshot.generation as i64;
        let metrics = &snapshot.metrics;

        tx.execute(
            r#"
            INSERT INTO solution_generation (
                generation, snapshot_id, network_revision, status, unmet_policy_json,
                objective_value, slow_lane_threshold_days, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                generation,
                snapshot.snapshot_id,
                snapshot.network_revision as i64,
                snapshot.status.as_str(),
                serde_json::to_string(&snapshot.unmet_policy)?,
                snapshot.objective_value,
                metrics.slow_lane_kpis.threshold_days,
                snapshot.created_at.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO optimal_flows (
                    generation, seq_no, dc_id, store_id, units_assigned, cost_per_unit_usd, flow_cost_usd
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for (seq_no, f) in snapshot.flows.iter().enumerate() {
                stmt.execute(params![
                    generation,
                    seq_no as i64,
                    f.dc_id,
                    f.store_id,
                    f.units_assigned,
                    f.cost_per_unit,
                    f.flow_cost
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO unmet_demand (generation, store_id, unmet_units) VALUES (?1, ?2, ?3)",
            )?;
            for u in &snapshot.unmet_demand {
                stmt.execute(params![generation, u.store_id, u.unmet_units])?;
            }

            let mut stmt = tx.prepare(
                r#"
                INSERT INTO dc_utilization (
                    generation, dc_id, weekly_capacity, units_assigned, utilization_pct, stores_served
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for d in &metrics.dc_utilization {
                let served = metrics
                    .stores_served_by_dc
                    .iter()
                    .find(|s| s.dc_id == d.dc_id)
                    .map(|s| s.stores_served)
                    .unwrap_or(0);
                stmt.execute(params![
                    generation,
                    d.dc_id,
                    d.weekly_capacity,
                    d.units_assigned,
                    d.utilization_pct,
                    served as i64
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO cost_by_dc (generation, dc_id, flow_cost_usd) VALUES (?1, ?2, ?3)",
            )?;
            for c in &metrics.cost_by_dc {
                stmt.execute(params![generation, c.dc_id, c.flow_cost])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO cost_by_region (generation, region, flow_cost_usd) VALUES (?1, ?2, ?3)",
            )?;
            for c in &metrics.cost_by_region {
                stmt.execute(params![generation, c.region, c.flow_cost])?;
            }

            let mut stmt = tx.prepare(
                r#"
                INSERT INTO slow_lanes_detail (
                    generation, seq_no, dc_id, store_id, service_time_days, units_assigned
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (seq_no, s) in metrics.slow_lanes.iter().enumerate() {
                stmt.execute(params![
                    generation,
                    seq_no as i64,
                    s.dc_id,
                    s.store_id,
                    s.service_time_days,
                    s.units_assigned
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO kpi_summary (generation, seq_no, metric, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (seq_no, row) in metrics.kpis.to_rows().iter().enumerate() {
                stmt.execute(params![generation, seq_no as i64, row.metric, row.value.to_string()])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(
            generation = snapshot.generation,
            flows = snapshot.flows.len(),
            "解快照已持久化"
        );
        Ok(())
    }

    /// 删除早于 keep_from 的所有代 (级联删除数据集)
    pub fn prune_before(&self, keep_from: u64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM solution_generation WHERE generation < ?1",
            [keep_from as i64],
        )?;
        Ok(removed)
    }

    // ==========================================
    // 读取
    // ==========================================

    pub fn list_generations(&self) -> RepositoryResult<Vec<GenerationInfo>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT generation, snapshot_id, network_revision, status, unmet_policy_json,
                   objective_value, slow_lane_threshold_days, created_at
            FROM solution_generation
            ORDER BY generation
            "#,
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(generation, snapshot_id, revision, status, policy, objective_value, threshold, created_at)|
                 -> RepositoryResult<GenerationInfo> {
                    Ok(GenerationInfo {
                        generation: generation as u64,
                        snapshot_id,
                        network_revision: revision as u64,
                        status: SolveStatus::from_str(&status).map_err(|e| {
                            RepositoryError::FieldValueError {
                                field: "status".to_string(),
                                message: e,
                            }
                        })?,
                        unmet_policy: serde_json::from_str(&policy)?,
                        objective_value,
                        slow_lane_threshold_days: threshold,
                        created_at: DateTime::parse_from_rfc3339(&created_at)
                            .map_err(|e| RepositoryError::FieldValueError {
                                field: "created_at".to_string(),
                                message: e.to_string(),
                            })?
                            .with_timezone(&Utc),
                    })
                },
            )
            .collect()
    }

    pub fn generation_info(&self, generation: u64) -> RepositoryResult<GenerationInfo> {
        self.list_generations()?
            .into_iter()
            .find(|g| g.generation == generation)
            .ok_or_else(|| RepositoryError::not_found("SolutionSnapshot", generation))
    }

    /// 按 seq_no 顺序读取流量
    pub fn load_flows(&self, generation: u64) -> RepositoryResult<Vec<Flow>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT dc_id, store_id, units_assigned, cost_per_unit_usd, flow_cost_usd
            FROM optimal_flows
            WHERE generation = ?1
            ORDER BY seq_no
            "#,
        )?;
        let rows = stmt
            .query_map([generation as i64], |row| {
                Ok(Flow {
                    dc_id: row.get(0)?,
                    store_id: row.get(1)?,
                    units_assigned: row.get(2)?,
                    cost_per_unit: row.get(3)?,
                    flow_cost: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 某 DC 的流量,按件数降序 (并列按门店升序)
    pub fn load_flows_for_dc(
        &self,
        generation: u64,
        dc_id: &str,
        top: Option<usize>,
    ) -> RepositoryResult<Vec<Flow>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT dc_id, store_id, units_assigned, cost_per_unit_usd, flow_cost_usd
            FROM optimal_flows
            WHERE generation = ?1 AND dc_id = ?2
            ORDER BY units_assigned DESC, store_id ASC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt
            .query_map(params![generation as i64, dc_id, sql_limit(top)], |row| {
                Ok(Flow {
                    dc_id: row.get(0)?,
                    store_id: row.get(1)?,
                    units_assigned: row.get(2)?,
                    cost_per_unit: row.get(3)?,
                    flow_cost: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_unmet_demand(&self, generation: u64) -> RepositoryResult<Vec<UnmetDemand>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT store_id, unmet_units FROM unmet_demand WHERE generation = ?1 ORDER BY store_id",
        )?;
        let rows = stmt
            .query_map([generation as i64], |row| {
                Ok(UnmetDemand {
                    store_id: row.get(0)?,
                    unmet_units: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 利用率 (dc_id 升序) 及每个 DC 的服务门店数
    fn load_utilization_rows(
        &self,
        generation: u64,
        order_by: &str,
        top: Option<usize>,
    ) -> RepositoryResult<Vec<(DcUtilization, usize)>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT dc_id, weekly_capacity, units_assigned, utilization_pct, stores_served
            FROM dc_utilization
            WHERE generation = ?1
            ORDER BY {}
            LIMIT ?2
            "#,
            order_by
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![generation as i64, sql_limit(top)], |row| {
                Ok((
                    DcUtilization {
                        dc_id: row.get(0)?,
                        weekly_capacity: row.get(1)?,
                        units_assigned: row.get(2)?,
                        utilization_pct: row.get(3)?,
                    },
                    row.get::<_, i64>(4)? as usize,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_dc_utilization(&self, generation: u64) -> RepositoryResult<Vec<DcUtilization>> {
        Ok(self
            .load_utilization_rows(generation, "dc_id ASC", None)?
            .into_iter()
            .map(|(u, _)| u)
            .collect())
    }

    /// 按利用率排序 (并列按 dc_id 升序)
    pub fn load_top_utilization(
        &self,
        generation: u64,
        order: SortOrder,
        top: Option<usize>,
    ) -> RepositoryResult<Vec<DcUtilization>> {
        let order_by = format!("utilization_pct {}, dc_id ASC", sql_order(order));
        Ok(self
            .load_utilization_rows(generation, &order_by, top)?
            .into_iter()
            .map(|(u, _)| u)
            .collect())
    }

    /// 有流量的 DC 的服务门店数
    pub fn load_stores_served(&self, generation: u64) -> RepositoryResult<Vec<StoresServed>> {
        Ok(self
            .load_utilization_rows(generation, "dc_id ASC", None)?
            .into_iter()
            .filter(|(_, served)| *served > 0)
            .map(|(u, stores_served)| StoresServed {
                dc_id: u.dc_id,
                stores_served,
            })
            .collect())
    }

    pub fn load_cost_by_dc(
        &self,
        generation: u64,
        order: SortOrder,
        top: Option<usize>,
    ) -> RepositoryResult<Vec<DcCost>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT dc_id, flow_cost_usd FROM cost_by_dc
            WHERE generation = ?1
            ORDER BY flow_cost_usd {}, dc_id ASC
            LIMIT ?2
            "#,
            sql_order(order)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![generation as i64, sql_limit(top)], |row| {
                Ok(DcCost {
                    dc_id: row.get(0)?,
                    flow_cost: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_cost_by_region(
        &self,
        generation: u64,
        order: SortOrder,
        top: Option<usize>,
    ) -> RepositoryResult<Vec<RegionCost>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT region, flow_cost_usd FROM cost_by_region
            WHERE generation = ?1
            ORDER BY flow_cost_usd {}, region ASC
            LIMIT ?2
            "#,
            sql_order(order)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![generation as i64, sql_limit(top)], |row| {
                Ok(RegionCost {
                    region: row.get(0)?,
                    flow_cost: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 慢线路明细 (写入时已按件数降序)
    pub fn load_slow_lanes(&self, generation: u64, top: Option<usize>) -> RepositoryResult<Vec<SlowLane>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT dc_id, store_id, service_time_days, units_assigned
            FROM slow_lanes_detail
            WHERE generation = ?1
            ORDER BY seq_no
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![generation as i64, sql_limit(top)], |row| {
                Ok(SlowLane {
                    dc_id: row.get(0)?,
                    store_id: row.get(1)?,
                    service_time_days: row.get(2)?,
                    units_assigned: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_kpi_rows(&self, generation: u64) -> RepositoryResult<Vec<KpiRow>> {
        self.ensure_generation(generation)?;
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT metric, value FROM kpi_summary WHERE generation = ?1 ORDER BY seq_no",
        )?;
        let rows = stmt
            .query_map([generation as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|(metric, value)| KpiRow {
                metric,
                value: kpi_value_from_text(value),
            })
            .collect())
    }

    pub fn load_kpis(&self, generation: u64) -> RepositoryResult<HeadlineKpis> {
        Ok(HeadlineKpis::from_rows(&self.load_kpi_rows(generation)?))
    }

    /// 还原完整快照
    pub fn load(&self, generation: u64) -> RepositoryResult<SolutionSnapshot> {
        let info = self.generation_info(generation)?;
        let flows = self.load_flows(generation)?;
        let unmet_demand = self.load_unmet_demand(generation)?;
        let utilization = self.load_utilization_rows(generation, "dc_id ASC", None)?;
        let slow_lanes = self.load_slow_lanes(generation, None)?;
        let kpis = self.load_kpis(generation)?;

        let slow_lane_kpis = SlowLaneKpis {
            threshold_days: info.slow_lane_threshold_days,
            slow_lane_count: slow_lanes.len(),
            units_on_slow_lanes: SlowLaneKpis::sum_units(&slow_lanes),
            total_shipped_units: kpis.total_shipped_units,
            pct_units_on_slow_lanes: kpis.pct_units_on_slow_lanes,
        };
        let stores_served_by_dc = utilization
            .iter()
            .filter(|(_, served)| *served > 0)
            .map(|(u, served)| StoresServed {
                dc_id: u.dc_id.clone(),
                stores_served: *served,
            })
            .collect();

        let metrics = DerivedMetrics {
            dc_utilization: utilization.into_iter().map(|(u, _)| u).collect(),
            cost_by_dc: self.load_cost_by_dc(generation, SortOrder::Desc, None)?,
            cost_by_region: self.load_cost_by_region(generation, SortOrder::Desc, None)?,
            stores_served_by_dc,
            slow_lanes,
            slow_lane_kpis,
            kpis,
        };

        Ok(SolutionSnapshot {
            snapshot_id: info.snapshot_id,
            generation: info.generation,
            network_revision: info.network_revision,
            status: info.status,
            unmet_policy: info.unmet_policy,
            objective_value: info.objective_value,
            flows,
            unmet_demand,
            metrics,
            created_at: info.created_at,
        })
    }
}
