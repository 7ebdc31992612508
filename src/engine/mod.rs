// ==========================================
// 配送网络优化系统 - 引擎层
// ==========================================
// 职责: 建模、求解、解提取、派生指标、情景变换
// 红线: Engine 不拼 SQL, 不持有全局状态
// ==========================================

pub mod comparison;
pub mod error;
pub mod extractor;
pub mod metrics;
pub mod model_builder;
pub mod orchestrator;
pub mod scenario;
pub mod solver;

// 重导出核心引擎
pub use comparison::{KpiComparison, KpiDelta};
pub use error::{EngineError, EngineResult};
pub use extractor::{ExtractedSolution, SolutionExtractor};
pub use metrics::{round2, DerivedMetricsBuilder};
pub use model_builder::{FlowModel, FlowModelBuilder, LinearRow, VariableLayout};
pub use orchestrator::NetworkOptimizer;
pub use scenario::ScenarioMutator;
pub use solver::{GoodLpSolver, LpSolver, RawSolution};
