// ==========================================
// 配送网络优化系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::optimizer_config::{
    OptimizerConfig, DEFAULT_SLOW_LANE_THRESHOLD_DAYS, DEFAULT_UNMET_PENALTY_PER_UNIT,
    DEFAULT_ZERO_TOLERANCE,
};
use crate::db::open_sqlite_connection;
use crate::domain::types::UnmetDemandPolicy;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取 f64 配置,缺失或格式错误时回退默认值
    fn get_f64_or_default(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => {
                    tracing::warn!(key, value = %raw, "配置值无法解析为数值,使用默认值 {}", default);
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 加载优化器参数
    ///
    /// # 说明
    /// - optimizer/unmet_penalty_per_unit: 单位缺货惩罚 (默认 10.0)
    /// - optimizer/allow_unmet_demand: "false" 时不建缺货变量
    /// - optimizer/zero_tolerance: 求解器噪声阈值 (默认 1e-6)
    /// - optimizer/slow_lane_threshold_days: 慢线路阈值 (默认 2.0)
    pub fn load_optimizer_config(&self) -> Result<OptimizerConfig, Box<dyn Error>> {
        let penalty =
            self.get_f64_or_default(config_keys::UNMET_PENALTY_PER_UNIT, DEFAULT_UNMET_PENALTY_PER_UNIT)?;
        let allow_unmet = self
            .get_config_value(config_keys::ALLOW_UNMET_DEMAND)?
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let unmet_policy = if allow_unmet {
            UnmetDemandPolicy::Penalized(penalty)
        } else {
            UnmetDemandPolicy::Disallowed
        };

        Ok(OptimizerConfig {
            unmet_policy,
            zero_tolerance: self.get_f64_or_default(config_keys::ZERO_TOLERANCE, DEFAULT_ZERO_TOLERANCE)?,
            slow_lane_threshold_days: self.get_f64_or_default(
                config_keys::SLOW_LANE_THRESHOLD_DAYS,
                DEFAULT_SLOW_LANE_THRESHOLD_DAYS,
            )?,
        })
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 求解时记录配置快照,便于对比基线与情景
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 缺货惩罚
    pub const UNMET_PENALTY_PER_UNIT: &str = "optimizer/unmet_penalty_per_unit";
    pub const ALLOW_UNMET_DEMAND: &str = "optimizer/allow_unmet_demand";

    // 数值容差
    pub const ZERO_TOLERANCE: &str = "optimizer/zero_tolerance";

    // 服务水平
    pub const SLOW_LANE_THRESHOLD_DAYS: &str = "optimizer/slow_lane_threshold_days";
}
