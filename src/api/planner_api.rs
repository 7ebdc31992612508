// ==========================================
// 配送网络优化系统 - 规划 API
// ==========================================
// 职责: 导入网络、全量求解、情景求解、按代读取结果数据集
// 红线: 求解串行执行 (solve guard); 快照整代持久化后才可读
// 红线: 所有读取先解析为具体 generation,不存在隐式"当前解"
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, OptimizerConfig};
use crate::domain::metrics::{
    DcCost, DcUtilization, HeadlineKpis, KpiRow, RegionCost, SlowLane, SlowLaneKpis, StoresServed,
};
use crate::domain::network::NetworkConfig;
use crate::domain::scenario::ScenarioLevers;
use crate::domain::solution::{Flow, SolutionSnapshot, UnmetDemand};
use crate::domain::types::SortOrder;
use crate::engine::{KpiComparison, NetworkOptimizer, ScenarioMutator};
use crate::importer::{NetworkImporter, SnapshotExporter};
use crate::repository::{GenerationInfo, NetworkRepository, SnapshotRepository};

// ==========================================
// GenerationSelector - 代号选择
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationSelector {
    /// 最新一代
    #[default]
    Latest,
    /// 指定代号
    Exact(u64),
}

impl From<Option<u64>> for GenerationSelector {
    fn from(value: Option<u64>) -> Self {
        value.map(GenerationSelector::Exact).unwrap_or_default()
    }
}

/// 情景求解结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// 应用杠杆后的网络配置 (已成为当前配置)
    pub network: NetworkConfig,
    pub snapshot: SolutionSnapshot,
}

// ==========================================
// PlannerApi - 规划 API
// ==========================================

/// 规划API
///
/// 职责：
/// 1. 网络参考数据导入
/// 2. 全量求解 / 情景求解 (串行)
/// 3. 按代读取输出数据集与KPI对比
/// 4. 导出 CSV
pub struct PlannerApi {
    network_repo: NetworkRepository,
    snapshot_repo: SnapshotRepository,
    config_manager: ConfigManager,
    solve_guard: Mutex<()>,
}

impl PlannerApi {
    /// 打开 (或创建) 数据库并构建 API
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_and_init(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 (schema 需已初始化)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config_manager = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(Self {
            network_repo: NetworkRepository::from_connection(conn.clone()),
            snapshot_repo: SnapshotRepository::from_connection(conn),
            config_manager,
            solve_guard: Mutex::new(()),
        })
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// 当前生效的优化器参数 (默认值 + config_kv 覆写)
    pub fn optimizer_config(&self) -> ApiResult<OptimizerConfig> {
        self.config_manager
            .load_optimizer_config()
            .map_err(|e| ApiError::InternalError(format!("加载优化器配置失败: {}", e)))
    }

    // ==========================================
    // 网络参考数据
    // ==========================================

    /// 导入三张表并替换当前网络 (revision 重置为 0)
    pub fn import_network(
        &self,
        dcs_path: impl AsRef<Path>,
        stores_path: impl AsRef<Path>,
        lanes_path: impl AsRef<Path>,
    ) -> ApiResult<NetworkConfig> {
        let network = NetworkImporter::new().import_files(dcs_path, stores_path, lanes_path)?;
        self.replace_network(&network)?;
        Ok(network)
    }

    /// 直接写入一份网络配置 (基线)
    pub fn replace_network(&self, network: &NetworkConfig) -> ApiResult<()> {
        let dangling = network.dangling_lanes().len();
        if dangling > 0 {
            warn!(dangling, "网络中存在引用未知 DC/门店的线路,求解时将被剔除");
        }
        self.network_repo.save(network, None)?;
        Ok(())
    }

    pub fn current_network(&self) -> ApiResult<NetworkConfig> {
        Ok(self.network_repo.require_current()?)
    }

    // ==========================================
    // 求解
    // ==========================================

    /// 对当前网络全量求解并持久化为新的一代
    pub fn run_full(&self) -> ApiResult<SolutionSnapshot> {
        let _guard = self
            .solve_guard
            .lock()
            .map_err(|e| ApiError::InternalError(format!("求解锁获取失败: {}", e)))?;

        let network = self.network_repo.require_current()?;
        let snapshot = self.solve_and_persist(&network)?;
        info!(generation = snapshot.generation, "全量求解完成");
        Ok(snapshot)
    }

    /// 应用情景杠杆后求解
    ///
    /// 求解成功后,新网络成为当前网络; 求解失败则当前网络保持不变
    pub fn run_scenario(&self, levers: &ScenarioLevers) -> ApiResult<ScenarioOutcome> {
        let _guard = self
            .solve_guard
            .lock()
            .map_err(|e| ApiError::InternalError(format!("求解锁获取失败: {}", e)))?;

        let base = self.network_repo.require_current()?;
        let network = ScenarioMutator::apply(&base, levers);
        let snapshot = self.solve_and_persist(&network)?;
        self.network_repo.save(&network, Some(levers))?;

        info!(
            generation = snapshot.generation,
            revision = network.revision,
            "情景求解完成"
        );
        Ok(ScenarioOutcome { network, snapshot })
    }

    fn solve_and_persist(&self, network: &NetworkConfig) -> ApiResult<SolutionSnapshot> {
        let config = self.optimizer_config()?;
        let generation = self.snapshot_repo.next_generation()?;
        let snapshot = NetworkOptimizer::new(config).optimize(network, generation)?;
        self.snapshot_repo.save(&snapshot)?;
        Ok(snapshot)
    }

    // ==========================================
    // 代号
    // ==========================================

    /// 解析为具体代号
    pub fn resolve_generation(&self, selector: GenerationSelector) -> ApiResult<u64> {
        match selector {
            GenerationSelector::Latest => self
                .snapshot_repo
                .latest_generation()?
                .ok_or_else(|| ApiError::NotFound("尚无任何求解结果".to_string())),
            GenerationSelector::Exact(generation) => {
                if self.snapshot_repo.generation_exists(generation)? {
                    Ok(generation)
                } else {
                    Err(ApiError::NotFound(format!("第 {} 代求解结果不存在", generation)))
                }
            }
        }
    }

    pub fn list_generations(&self) -> ApiResult<Vec<GenerationInfo>> {
        Ok(self.snapshot_repo.list_generations()?)
    }

    pub fn get_snapshot(&self, selector: GenerationSelector) -> ApiResult<SolutionSnapshot> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load(generation)?)
    }

    // ==========================================
    // 读取数据集
    // ==========================================

    pub fn get_kpis(&self, selector: GenerationSelector) -> ApiResult<HeadlineKpis> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_kpis(generation)?)
    }

    /// kpi_summary 原始行 (metric → value)
    pub fn get_kpi_rows(&self, selector: GenerationSelector) -> ApiResult<Vec<KpiRow>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_kpi_rows(generation)?)
    }

    pub fn get_slow_lane_kpis(&self, selector: GenerationSelector) -> ApiResult<SlowLaneKpis> {
        Ok(self.get_snapshot(selector)?.metrics.slow_lane_kpis)
    }

    pub fn list_flows(&self, selector: GenerationSelector) -> ApiResult<Vec<Flow>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_flows(generation)?)
    }

    pub fn list_unmet_demand(&self, selector: GenerationSelector) -> ApiResult<Vec<UnmetDemand>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_unmet_demand(generation)?)
    }

    pub fn list_dc_utilization(&self, selector: GenerationSelector) -> ApiResult<Vec<DcUtilization>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_dc_utilization(generation)?)
    }

    /// 利用率最高 (Desc) 或最低 (Asc) 的 DC
    pub fn top_utilization(
        &self,
        selector: GenerationSelector,
        order: SortOrder,
        top: usize,
    ) -> ApiResult<Vec<DcUtilization>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self
            .snapshot_repo
            .load_top_utilization(generation, order, Some(top))?)
    }

    /// 单个 DC 的利用率
    pub fn dc_utilization(&self, selector: GenerationSelector, dc_id: &str) -> ApiResult<DcUtilization> {
        self.list_dc_utilization(selector)?
            .into_iter()
            .find(|d| d.dc_id == dc_id)
            .ok_or_else(|| ApiError::NotFound(format!("DC {} 不存在", dc_id)))
    }

    pub fn cost_by_dc(
        &self,
        selector: GenerationSelector,
        order: SortOrder,
        top: usize,
    ) -> ApiResult<Vec<DcCost>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_cost_by_dc(generation, order, Some(top))?)
    }

    pub fn cost_by_region(
        &self,
        selector: GenerationSelector,
        order: SortOrder,
        top: usize,
    ) -> ApiResult<Vec<RegionCost>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self
            .snapshot_repo
            .load_cost_by_region(generation, order, Some(top))?)
    }

    pub fn slow_lanes(&self, selector: GenerationSelector, top: usize) -> ApiResult<Vec<SlowLane>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_slow_lanes(generation, Some(top))?)
    }

    pub fn stores_served_by_dc(&self, selector: GenerationSelector) -> ApiResult<Vec<StoresServed>> {
        let generation = self.resolve_generation(selector)?;
        Ok(self.snapshot_repo.load_stores_served(generation)?)
    }

    /// 某 DC 服务的门店,按件数降序
    pub fn stores_for_dc(
        &self,
        selector: GenerationSelector,
        dc_id: &str,
        top: usize,
    ) -> ApiResult<Vec<Flow>> {
        let dc_id = dc_id.trim();
        if dc_id.is_empty() {
            return Err(ApiError::InvalidInput("dc_id 不能为空".to_string()));
        }
        let generation = self.resolve_generation(selector)?;
        Ok(self
            .snapshot_repo
            .load_flows_for_dc(generation, dc_id, Some(top))?)
    }

    // ==========================================
    // 对比与导出
    // ==========================================

    /// 两代头部KPI对比 (current - baseline)
    pub fn compare_generations(
        &self,
        baseline: GenerationSelector,
        current: GenerationSelector,
    ) -> ApiResult<KpiComparison> {
        let baseline_generation = self.resolve_generation(baseline)?;
        let current_generation = self.resolve_generation(current)?;
        let baseline_kpis = self.snapshot_repo.load_kpis(baseline_generation)?;
        let current_kpis = self.snapshot_repo.load_kpis(current_generation)?;
        Ok(KpiComparison::between(
            baseline_generation,
            &baseline_kpis,
            current_generation,
            &current_kpis,
        ))
    }

    pub fn export(&self, selector: GenerationSelector, out_dir: impl AsRef<Path>) -> ApiResult<Vec<PathBuf>> {
        let snapshot = self.get_snapshot(selector)?;
        Ok(SnapshotExporter::export(&snapshot, out_dir)?)
    }
}
