// ==========================================
// 配送网络优化系统 - 网络参考数据导入
// ==========================================
// 输入: DC 表 / 门店表 / 线路表 (CSV 或 Excel)
// 输出: 基线 NetworkConfig (revision = 0)
// ==========================================
// 规则:
// - ID 去除首尾空白; 必填数值缺失或无法解析 → 带行号的导入错误
// - DC / 门店 ID 重复 → 导入错误; 线路重复与悬空留给建模阶段处理
// - 不做清洗与插补
// ==========================================

use crate::domain::network::{DistributionCenter, Lane, NetworkConfig, Store};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRecord, UniversalFileParser};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// 各表列名
pub mod columns {
    pub const DC_ID: &str = "dc_id";
    pub const WEEKLY_CAPACITY: &str = "weekly_capacity";
    pub const STORE_ID: &str = "store_id";
    pub const WEEKLY_DEMAND: &str = "weekly_demand";
    pub const REGION: &str = "region";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
    pub const COST_PER_UNIT: &str = "cost_per_unit_usd";
    pub const SERVICE_TIME_DAYS: &str = "service_time_days";
}

fn require_columns(table: &str, records: &[RawRecord], required: &[&str]) -> ImportResult<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    for column in required {
        if !first.fields.contains_key(*column) {
            return Err(ImportError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn required_text(record: &RawRecord, field: &str) -> ImportResult<String> {
    record
        .get(field)
        .map(str::to_string)
        .ok_or_else(|| ImportError::MissingField {
            row: record.row_no,
            field: field.to_string(),
        })
}

fn parse_number(record: &RawRecord, field: &str, raw: &str) -> ImportResult<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ImportError::TypeConversionError {
            row: record.row_no,
            field: field.to_string(),
            message: format!("无法解析为数值: {}", raw),
        })
}

fn required_number(record: &RawRecord, field: &str) -> ImportResult<f64> {
    let raw = record.get(field).ok_or_else(|| ImportError::MissingField {
        row: record.row_no,
        field: field.to_string(),
    })?;
    parse_number(record, field, raw)
}

fn optional_number(record: &RawRecord, field: &str) -> ImportResult<Option<f64>> {
    record
        .get(field)
        .map(|raw| parse_number(record, field, raw))
        .transpose()
}

fn check_unique(seen: &mut BTreeSet<String>, record: &RawRecord, key: &str) -> ImportResult<()> {
    if !seen.insert(key.to_string()) {
        return Err(ImportError::DuplicateKey {
            row: record.row_no,
            key: key.to_string(),
        });
    }
    Ok(())
}

// ==========================================
// NetworkImporter
// ==========================================
pub struct NetworkImporter {
    parser: UniversalFileParser,
}

impl Default for NetworkImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkImporter {
    pub fn new() -> Self {
        Self {
            parser: UniversalFileParser,
        }
    }

    /// 从三张表文件构建基线网络
    pub fn import_files(
        &self,
        dcs_path: impl AsRef<Path>,
        stores_path: impl AsRef<Path>,
        lanes_path: impl AsRef<Path>,
    ) -> ImportResult<NetworkConfig> {
        let dcs = self.parse_dcs(&self.parser.parse(dcs_path)?)?;
        let stores = self.parse_stores(&self.parser.parse(stores_path)?)?;
        let lanes = self.parse_lanes(&self.parser.parse(lanes_path)?)?;

        info!(
            dcs = dcs.len(),
            stores = stores.len(),
            lanes = lanes.len(),
            "网络参考数据导入完成"
        );
        Ok(NetworkConfig::baseline(dcs, stores, lanes))
    }

    pub fn parse_dcs(&self, records: &[RawRecord]) -> ImportResult<Vec<DistributionCenter>> {
        use columns::*;
        require_columns("dcs", records, &[DC_ID, WEEKLY_CAPACITY])?;

        let mut seen = BTreeSet::new();
        records
            .iter()
            .map(|r| -> ImportResult<DistributionCenter> {
                let dc_id = required_text(r, DC_ID)?;
                check_unique(&mut seen, r, &dc_id)?;
                Ok(DistributionCenter {
                    weekly_capacity: required_number(r, WEEKLY_CAPACITY)?,
                    lat: optional_number(r, LAT)?,
                    lon: optional_number(r, LON)?,
                    dc_id,
                })
            })
            .collect()
    }

    pub fn parse_stores(&self, records: &[RawRecord]) -> ImportResult<Vec<Store>> {
        use columns::*;
        require_columns("stores", records, &[STORE_ID, WEEKLY_DEMAND, REGION])?;

        let mut seen = BTreeSet::new();
        records
            .iter()
            .map(|r| -> ImportResult<Store> {
                let store_id = required_text(r, STORE_ID)?;
                check_unique(&mut seen, r, &store_id)?;
                Ok(Store {
                    weekly_demand: required_number(r, WEEKLY_DEMAND)?,
                    region: required_text(r, REGION)?,
                    lat: optional_number(r, LAT)?,
                    lon: optional_number(r, LON)?,
                    store_id,
                })
            })
            .collect()
    }

    pub fn parse_lanes(&self, records: &[RawRecord]) -> ImportResult<Vec<Lane>> {
        use columns::*;
        require_columns(
            "lanes",
            records,
            &[DC_ID, STORE_ID, COST_PER_UNIT, SERVICE_TIME_DAYS],
        )?;

        records
            .iter()
            .map(|r| -> ImportResult<Lane> {
                Ok(Lane {
                    dc_id: required_text(r, DC_ID)?,
                    store_id: required_text(r, STORE_ID)?,
                    cost_per_unit: required_number(r, COST_PER_UNIT)?,
                    service_time_days: required_number(r, SERVICE_TIME_DAYS)?,
                })
            })
            .collect()
    }
}
