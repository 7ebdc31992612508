// ==========================================
// 配送网络优化系统 - 网络参考数据仓储
// ==========================================
// 表: distribution_center / store / lane / network_revision
// 红线: Repository 不含业务逻辑; 整体替换在单个事务内完成
// ==========================================

use crate::domain::network::{DistributionCenter, Lane, NetworkConfig, Store};
use crate::domain::scenario::ScenarioLevers;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// NetworkRepository - 网络仓储
// ==========================================

/// 网络仓储
/// 职责: 读写"当前"网络配置 (基线或最近一次情景的结果)
pub struct NetworkRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NetworkRepository {
    /// 创建新的网络仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 整体替换当前网络配置
    ///
    /// # 参数
    /// - network: 新配置 (含 revision / parent_revision)
    /// - levers: 生成该配置的情景杠杆 (基线导入为 None)
    pub fn save(&self, network: &NetworkConfig, levers: Option<&ScenarioLevers>) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM lane", [])?;
        tx.execute("DELETE FROM store", [])?;
        tx.execute("DELETE FROM distribution_center", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO distribution_center (dc_id, weekly_capacity, lat, lon) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for dc in &network.dcs {
                stmt.execute(params![dc.dc_id, dc.weekly_capacity, dc.lat, dc.lon])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO store (store_id, weekly_demand, region, lat, lon) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in &network.stores {
                stmt.execute(params![s.store_id, s.weekly_demand, s.region, s.lat, s.lon])?;
            }

            // 重复线路保留首条,与建模口径一致
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO lane (dc_id, store_id, cost_per_unit_usd, service_time_days)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for l in &network.lanes {
                stmt.execute(params![l.dc_id, l.store_id, l.cost_per_unit, l.service_time_days])?;
            }
        }

        let levers_json = levers.map(|l| serde_json::to_string(l)).transpose()?;
        tx.execute(
            r#"
            INSERT INTO network_revision (id, revision, parent_revision, levers_json, updated_at)
            VALUES (1, ?1, ?2, ?3, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                parent_revision = excluded.parent_revision,
                levers_json = excluded.levers_json,
                updated_at = excluded.updated_at
            "#,
            params![
                network.revision as i64,
                network.parent_revision.map(|r| r as i64),
                levers_json
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(
            revision = network.revision,
            dcs = network.dcs.len(),
            stores = network.stores.len(),
            lanes = network.lanes.len(),
            "网络配置已保存"
        );
        Ok(())
    }

    /// 读取当前网络配置
    ///
    /// # 返回
    /// - Ok(Some(NetworkConfig)): 已导入
    /// - Ok(None): 尚未导入任何网络
    pub fn load_current(&self) -> RepositoryResult<Option<NetworkConfig>> {
        let conn = self.get_conn()?;

        let header: Option<(i64, Option<i64>)> = conn
            .query_row(
                "SELECT revision, parent_revision FROM network_revision WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((revision, parent_revision)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT dc_id, weekly_capacity, lat, lon FROM distribution_center ORDER BY dc_id",
        )?;
        let dcs = stmt
            .query_map([], |row| {
                Ok(DistributionCenter {
                    dc_id: row.get(0)?,
                    weekly_capacity: row.get(1)?,
                    lat: row.get(2)?,
                    lon: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT store_id, weekly_demand, region, lat, lon FROM store ORDER BY store_id",
        )?;
        let stores = stmt
            .query_map([], |row| {
                Ok(Store {
                    store_id: row.get(0)?,
                    weekly_demand: row.get(1)?,
                    region: row.get(2)?,
                    lat: row.get(3)?,
                    lon: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT dc_id, store_id, cost_per_unit_usd, service_time_days
            FROM lane
            ORDER BY dc_id, store_id
            "#,
        )?;
        let lanes = stmt
            .query_map([], |row| {
                Ok(Lane {
                    dc_id: row.get(0)?,
                    store_id: row.get(1)?,
                    cost_per_unit: row.get(2)?,
                    service_time_days: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(NetworkConfig {
            revision: revision as u64,
            parent_revision: parent_revision.map(|r| r as u64),
            dcs,
            stores,
            lanes,
        }))
    }

    /// 读取当前网络配置,不存在时报 NotFound
    pub fn require_current(&self) -> RepositoryResult<NetworkConfig> {
        self.load_current()?
            .ok_or_else(|| RepositoryError::not_found("NetworkConfig", "current"))
    }

    /// 生成当前配置的情景杠杆 (基线为 None)
    pub fn current_levers(&self) -> RepositoryResult<Option<ScenarioLevers>> {
        let conn = self.get_conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT levers_json FROM network_revision WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match raw.flatten() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
