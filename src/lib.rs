// ==========================================
// 配送网络优化系统 - 核心库
// ==========================================
// 定位: DC → 门店 最小成本流规划 (带缺货惩罚的线性规划)
// 技术栈: Rust + good_lp + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 建模/求解/派生指标
pub mod engine;

// 导入导出层 - 外部表格
pub mod importer;

// 配置层 - 优化器参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 规划用例
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{SolveStatus, SortOrder, UnmetDemandPolicy};

// 领域实体
pub use domain::{
    DistributionCenter, Flow, HeadlineKpis, Lane, NetworkConfig, ScenarioLevers,
    SolutionSnapshot, Store, UnmetDemand,
};

// 引擎
pub use engine::{
    DerivedMetricsBuilder, FlowModelBuilder, GoodLpSolver, KpiComparison, LpSolver,
    NetworkOptimizer, ScenarioMutator, SolutionExtractor,
};

// 配置
pub use config::OptimizerConfig;

// API
pub use api::{ApiError, GenerationSelector, PlannerApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "配送网络优化系统";
