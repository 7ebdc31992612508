// ==========================================
// 配送网络优化系统 - 优化编排器
// ==========================================
// 主流程: 建模 → 求解 → 解提取 → 派生指标 → 解快照
// 红线: 不访问数据库; 网络配置与参数显式传入
// 红线: 求解失败原样上抛,不产出部分快照
// ==========================================

use crate::config::OptimizerConfig;
use crate::domain::network::NetworkConfig;
use crate::domain::solution::SolutionSnapshot;
use crate::domain::types::SolveStatus;
use crate::engine::error::EngineResult;
use crate::engine::extractor::SolutionExtractor;
use crate::engine::metrics::DerivedMetricsBuilder;
use crate::engine::model_builder::FlowModelBuilder;
use crate::engine::solver::{GoodLpSolver, LpSolver};
use chrono::Utc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// NetworkOptimizer
// ==========================================
pub struct NetworkOptimizer<S: LpSolver = GoodLpSolver> {
    config: OptimizerConfig,
    solver: S,
}

impl NetworkOptimizer<GoodLpSolver> {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            solver: GoodLpSolver::new(),
        }
    }
}

impl<S: LpSolver> NetworkOptimizer<S> {
    /// 使用自定义求解器 (测试桩等)
    pub fn with_solver(config: OptimizerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 对给定网络配置执行一次完整优化
    ///
    /// # 参数
    /// - network: 显式网络配置 (基线或情景)
    /// - generation: 由调用方分配的解代号
    #[instrument(skip(self, network), fields(revision = network.revision, solver = self.solver.name()))]
    pub fn optimize(&self, network: &NetworkConfig, generation: u64) -> EngineResult<SolutionSnapshot> {
        let start = Instant::now();

        // ===== 1. 建模 =====
        let model = FlowModelBuilder::from_config(&self.config).build(network);
        info!(
            num_vars = model.num_vars(),
            eq_rows = model.eq_rows.len(),
            ub_rows = model.ub_rows.len(),
            dropped_lanes = model.dropped_lanes,
            "LP 模型构建完成"
        );

        // ===== 2. 求解 =====
        let raw = self.solver.solve(&model).map_err(|e| {
            warn!(error = %e, "LP 求解失败");
            e
        })?;

        // ===== 3. 解提取 =====
        let extracted = SolutionExtractor::new(self.config.zero_tolerance).extract(&model, &raw)?;

        // ===== 4. 派生指标 =====
        let metrics = DerivedMetricsBuilder::new(
            self.config.penalty_or_zero(),
            self.config.slow_lane_threshold_days,
        )
        .build(
            &extracted.flows,
            &extracted.unmet_demand,
            network,
            SolveStatus::Optimal,
        );

        let snapshot = SolutionSnapshot {
            snapshot_id: Uuid::new_v4().to_string(),
            generation,
            network_revision: network.revision,
            status: SolveStatus::Optimal,
            unmet_policy: self.config.unmet_policy,
            objective_value: raw.objective_value,
            flows: extracted.flows,
            unmet_demand: extracted.unmet_demand,
            metrics,
            created_at: Utc::now(),
        };

        info!(
            generation,
            flows = snapshot.flows.len(),
            objective_value = snapshot.objective_value,
            unmet_units = snapshot.metrics.kpis.unmet_units,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "优化完成"
        );

        Ok(snapshot)
    }
}
