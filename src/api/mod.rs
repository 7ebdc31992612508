// ==========================================
// 配送网络优化系统 - API 层
// ==========================================
// 职责: 编排 Repository + Engine,对外提供规划用例
// ==========================================

pub mod error;
pub mod planner_api;

pub use error::{ApiError, ApiResult};
pub use planner_api::{GenerationSelector, PlannerApi, ScenarioOutcome};
