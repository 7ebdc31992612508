// ==========================================
// 配送网络优化系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表脚本集中在此处,参考表与结果表一次建齐
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema (幂等)
///
/// 表分三组:
/// - 配置: schema_version / config_scope / config_kv
/// - 参考数据: network_revision / distribution_center / store / lane
/// - 求解结果: solution_generation 及按 generation 分区的各数据集
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- 当前网络配置修订号 (单行)
        CREATE TABLE IF NOT EXISTS network_revision (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            revision INTEGER NOT NULL,
            parent_revision INTEGER,
            levers_json TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS distribution_center (
            dc_id TEXT PRIMARY KEY,
            weekly_capacity REAL NOT NULL,
            lat REAL,
            lon REAL
        );

        CREATE TABLE IF NOT EXISTS store (
            store_id TEXT PRIMARY KEY,
            weekly_demand REAL NOT NULL,
            region TEXT NOT NULL,
            lat REAL,
            lon REAL
        );
        CREATE INDEX IF NOT EXISTS ix_store_region ON store(region);

        -- 线路不加外键: 悬空线路在建模前过滤,而不是在写入时拒绝
        CREATE TABLE IF NOT EXISTS lane (
            dc_id TEXT NOT NULL,
            store_id TEXT NOT NULL,
            cost_per_unit_usd REAL NOT NULL,
            service_time_days REAL NOT NULL,
            PRIMARY KEY (dc_id, store_id)
        );

        CREATE TABLE IF NOT EXISTS solution_generation (
            generation INTEGER PRIMARY KEY,
            snapshot_id TEXT NOT NULL UNIQUE,
            network_revision INTEGER NOT NULL,
            status TEXT NOT NULL,
            unmet_policy_json TEXT NOT NULL,
            objective_value REAL NOT NULL,
            slow_lane_threshold_days REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS optimal_flows (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            seq_no INTEGER NOT NULL,
            dc_id TEXT NOT NULL,
            store_id TEXT NOT NULL,
            units_assigned REAL NOT NULL,
            cost_per_unit_usd REAL NOT NULL,
            flow_cost_usd REAL NOT NULL,
            PRIMARY KEY (generation, seq_no)
        );
        CREATE INDEX IF NOT EXISTS ix_optimal_flows_dc ON optimal_flows(generation, dc_id);

        CREATE TABLE IF NOT EXISTS unmet_demand (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            store_id TEXT NOT NULL,
            unmet_units REAL NOT NULL,
            PRIMARY KEY (generation, store_id)
        );

        CREATE TABLE IF NOT EXISTS dc_utilization (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            dc_id TEXT NOT NULL,
            weekly_capacity REAL NOT NULL,
            units_assigned REAL NOT NULL,
            utilization_pct REAL NOT NULL,
            stores_served INTEGER NOT NULL,
            PRIMARY KEY (generation, dc_id)
        );

        CREATE TABLE IF NOT EXISTS cost_by_dc (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            dc_id TEXT NOT NULL,
            flow_cost_usd REAL NOT NULL,
            PRIMARY KEY (generation, dc_id)
        );

        CREATE TABLE IF NOT EXISTS cost_by_region (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            region TEXT NOT NULL,
            flow_cost_usd REAL NOT NULL,
            PRIMARY KEY (generation, region)
        );

        CREATE TABLE IF NOT EXISTS slow_lanes_detail (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            seq_no INTEGER NOT NULL,
            dc_id TEXT NOT NULL,
            store_id TEXT NOT NULL,
            service_time_days REAL NOT NULL,
            units_assigned REAL NOT NULL,
            PRIMARY KEY (generation, seq_no)
        );

        CREATE TABLE IF NOT EXISTS kpi_summary (
            generation INTEGER NOT NULL REFERENCES solution_generation(generation) ON DELETE CASCADE,
            seq_no INTEGER NOT NULL,
            metric TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (generation, metric)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 打开连接并确保 schema 已初始化
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;

    if let Some(v) = read_schema_version(&conn)? {
        if v != CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "schema_version 不一致: 数据库={}, 代码期望={}",
                v,
                CURRENT_SCHEMA_VERSION
            );
        }
    }

    Ok(conn)
}
