// ==========================================
// 配送网络优化系统 - 网络参考数据领域模型
// ==========================================
// 职责: DC / 门店 / 线路 三张参考表,以及带修订号的网络配置
// 红线: 网络配置是显式传入每次求解的值,不存在全局可变状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// DistributionCenter - 配送中心
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionCenter {
    pub dc_id: String,          // 配送中心ID (唯一)
    pub weekly_capacity: f64,   // 周吞吐能力 (件)
    pub lat: Option<f64>,       // 纬度 (仅供外部展示)
    pub lon: Option<f64>,       // 经度 (仅供外部展示)
}

impl DistributionCenter {
    pub fn new(dc_id: impl Into<String>, weekly_capacity: f64) -> Self {
        Self {
            dc_id: dc_id.into(),
            weekly_capacity,
            lat: None,
            lon: None,
        }
    }
}

// ==========================================
// Store - 门店
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,       // 门店ID (唯一)
    pub weekly_demand: f64,     // 周需求 (件)
    pub region: String,         // 区域 (用于成本汇总)
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Store {
    pub fn new(store_id: impl Into<String>, weekly_demand: f64, region: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            weekly_demand,
            region: region.into(),
            lat: None,
            lon: None,
        }
    }
}

// ==========================================
// Lane - 运输线路
// ==========================================
// 线路是唯一可行的发运路径,目录之外的 (DC, 门店) 组合流量恒为 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub dc_id: String,
    pub store_id: String,
    pub cost_per_unit: f64,       // 单位运费 (负值视为数据质量信号,本层不拒绝)
    pub service_time_days: f64,   // 运输时效 (天)
}

impl Lane {
    pub fn new(
        dc_id: impl Into<String>,
        store_id: impl Into<String>,
        cost_per_unit: f64,
        service_time_days: f64,
    ) -> Self {
        Self {
            dc_id: dc_id.into(),
            store_id: store_id.into(),
            cost_per_unit,
            service_time_days,
        }
    }

    /// 线路键 (dc_id, store_id)
    pub fn key(&self) -> (&str, &str) {
        (self.dc_id.as_str(), self.store_id.as_str())
    }
}

// ==========================================
// NetworkConfig - 网络配置 (带修订号)
// ==========================================
// 修订号 0 为导入基线,每次应用情景杠杆生成 parent + 1 的新配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub revision: u64,
    pub parent_revision: Option<u64>,
    pub dcs: Vec<DistributionCenter>,
    pub stores: Vec<Store>,
    pub lanes: Vec<Lane>,
}

impl NetworkConfig {
    /// 创建基线配置 (revision = 0)
    pub fn baseline(dcs: Vec<DistributionCenter>, stores: Vec<Store>, lanes: Vec<Lane>) -> Self {
        Self {
            revision: 0,
            parent_revision: None,
            dcs,
            stores,
            lanes,
        }
    }

    pub fn total_capacity(&self) -> f64 {
        self.unique_dcs().iter().map(|dc| dc.weekly_capacity).sum()
    }

    pub fn total_demand(&self) -> f64 {
        self.unique_stores().iter().map(|s| s.weekly_demand).sum()
    }

    /// 按 dc_id 升序的 DC 列表 (固定累加顺序)
    pub fn dcs_sorted(&self) -> Vec<&DistributionCenter> {
        let mut dcs: Vec<&DistributionCenter> = self.dcs.iter().collect();
        dcs.sort_by(|a, b| a.dc_id.cmp(&b.dc_id));
        dcs
    }

    /// 按 store_id 升序的门店列表
    pub fn stores_sorted(&self) -> Vec<&Store> {
        let mut stores: Vec<&Store> = self.stores.iter().collect();
        stores.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        stores
    }

    /// 按 dc_id 去重 (重复时保留排序后的第一条,与建模口径一致)
    pub fn unique_dcs(&self) -> Vec<&DistributionCenter> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        self.dcs_sorted()
            .into_iter()
            .filter(|dc| seen.insert(dc.dc_id.as_str()))
            .collect()
    }

    /// 按 store_id 去重
    pub fn unique_stores(&self) -> Vec<&Store> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        self.stores_sorted()
            .into_iter()
            .filter(|s| seen.insert(s.store_id.as_str()))
            .collect()
    }

    pub fn find_dc(&self, dc_id: &str) -> Option<&DistributionCenter> {
        self.dcs.iter().find(|dc| dc.dc_id == dc_id)
    }

    pub fn find_store(&self, store_id: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.store_id == store_id)
    }

    /// 门店 → 区域 映射
    pub fn region_by_store(&self) -> BTreeMap<&str, &str> {
        self.stores
            .iter()
            .map(|s| (s.store_id.as_str(), s.region.as_str()))
            .collect()
    }

    /// 所有区域 (去重、升序)
    pub fn regions(&self) -> BTreeSet<&str> {
        self.stores.iter().map(|s| s.region.as_str()).collect()
    }

    /// 引用了未知 DC 或门店的线路
    pub fn dangling_lanes(&self) -> Vec<&Lane> {
        let dc_ids: BTreeSet<&str> = self.dcs.iter().map(|d| d.dc_id.as_str()).collect();
        let store_ids: BTreeSet<&str> = self.stores.iter().map(|s| s.store_id.as_str()).collect();
        self.lanes
            .iter()
            .filter(|l| !dc_ids.contains(l.dc_id.as_str()) || !store_ids.contains(l.store_id.as_str()))
            .collect()
    }
}
