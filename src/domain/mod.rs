// ==========================================
// 配送网络优化系统 - 领域模型层
// ==========================================
// 职责: 定义网络实体、解快照、派生指标、情景杠杆
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod metrics;
pub mod network;
pub mod scenario;
pub mod solution;
pub mod types;

// 重导出核心类型
pub use metrics::{
    metric_names, CostRollup, DcCost, DcUtilization, DerivedMetrics, HeadlineKpis, KpiRow,
    KpiValue, RegionCost, SlowLane, SlowLaneKpis, StoresServed,
};
pub use network::{DistributionCenter, Lane, NetworkConfig, Store};
pub use scenario::ScenarioLevers;
pub use solution::{Flow, SolutionSnapshot, UnmetDemand};
pub use types::{SolveStatus, SortOrder, UnmetDemandPolicy};
