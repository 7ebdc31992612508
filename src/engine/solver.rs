// ==========================================
// 配送网络优化系统 - LP 求解适配器
// ==========================================
// 职责: 把 FlowModel 交给通用 LP 求解器,归一化其结果
// 契约: 变量下界 0、无上界; 非最优状态一律以 SolveFailed 上抛
// 后端: good_lp + microlp (纯 Rust 单纯形法,解落在顶点上)
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::model_builder::{FlowModel, LinearRow};
use good_lp::solvers::microlp::microlp;
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};

/// 空行可行性判断的容差
const EMPTY_ROW_TOLERANCE: f64 = 1e-9;

// ==========================================
// RawSolution - 原始解
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    /// 与 FlowModel.layout 同序的变量取值
    pub values: Vec<f64>,
    /// c·x
    pub objective_value: f64,
}

// ==========================================
// Trait: LpSolver
// ==========================================
// 引擎只依赖该接口,测试可替换为桩实现
pub trait LpSolver {
    /// 求解器名称 (日志用)
    fn name(&self) -> &str;

    /// 求解;非最优一律返回 EngineError::SolveFailed
    fn solve(&self, model: &FlowModel) -> EngineResult<RawSolution>;
}

// ==========================================
// 空行预检
// ==========================================
// 没有变量的约束行不交给后端:
// - 等式空行要求 rhs == 0
// - 不等式空行要求 rhs >= 0
fn check_empty_rows(model: &FlowModel) -> EngineResult<()> {
    for row in model.eq_rows.iter().filter(|r| r.is_empty()) {
        if row.rhs.abs() > EMPTY_ROW_TOLERANCE {
            return Err(EngineError::solve_failed(format!(
                "infeasible: 门店 {} 需求 {} 无任何可行变量",
                row.label, row.rhs
            )));
        }
    }
    for row in model.ub_rows.iter().filter(|r| r.is_empty()) {
        if row.rhs < -EMPTY_ROW_TOLERANCE {
            return Err(EngineError::solve_failed(format!(
                "infeasible: DC {} 产能为负 ({})",
                row.label, row.rhs
            )));
        }
    }
    Ok(())
}

// ==========================================
// GoodLpSolver - good_lp / microlp 后端
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    pub fn new() -> Self {
        Self
    }

    fn row_expression(row: &LinearRow, vars: &[Variable]) -> Expression {
        row.coefficients
            .iter()
            .map(|(idx, coef)| *coef * vars[*idx])
            .sum()
    }
}

impl LpSolver for GoodLpSolver {
    fn name(&self) -> &str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &FlowModel) -> EngineResult<RawSolution> {
        check_empty_rows(model)?;

        let n = model.num_vars();
        if n == 0 {
            // 无变量: 所有约束均为空行且已通过预检
            return Ok(RawSolution {
                values: Vec::new(),
                objective_value: 0.0,
            });
        }

        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = (0..n)
            .map(|_| problem_vars.add(variable().min(0.0)))
            .collect();

        let objective: Expression = model
            .objective
            .iter()
            .zip(vars.iter())
            .map(|(c, v)| *c * *v)
            .sum();

        let mut problem = problem_vars.minimise(objective).using(microlp);

        for row in model.eq_rows.iter().filter(|r| !r.is_empty()) {
            problem = problem.with(constraint::eq(Self::row_expression(row, &vars), row.rhs));
        }
        for row in model.ub_rows.iter().filter(|r| !r.is_empty()) {
            problem = problem.with(constraint::leq(Self::row_expression(row, &vars), row.rhs));
        }

        let solution = problem
            .solve()
            .map_err(|e| EngineError::solve_failed(e.to_string()))?;

        let values: Vec<f64> = vars.iter().map(|v| solution.value(*v)).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::solve_failed("numerical failure: 解向量含非有限值"));
        }
        let objective_value = model.evaluate_objective(&values);

        Ok(RawSolution {
            values,
            objective_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{DistributionCenter, Lane, NetworkConfig, Store};
    use crate::domain::types::UnmetDemandPolicy;
    use crate::engine::model_builder::FlowModelBuilder;

    #[test]
    fn test_empty_model_is_trivially_optimal() {
        let network = NetworkConfig::baseline(vec![], vec![], vec![]);
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        let raw = GoodLpSolver::new().solve(&model).unwrap();
        assert!(raw.values.is_empty());
        assert_eq!(raw.objective_value, 0.0);
    }

    #[test]
    fn test_disallowed_store_without_lanes_is_infeasible() {
        let network = NetworkConfig::baseline(
            vec![DistributionCenter::new("DC1", 100.0)],
            vec![Store::new("S1", 10.0, "East")],
            vec![],
        );
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Disallowed).build(&network);
        let err = GoodLpSolver::new().solve(&model).unwrap_err();
        match err {
            EngineError::SolveFailed { status } => assert!(status.contains("infeasible")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_disallowed_over_demand_fails_in_backend() {
        let network = NetworkConfig::baseline(
            vec![DistributionCenter::new("DC1", 10.0)],
            vec![Store::new("S1", 50.0, "East")],
            vec![Lane::new("DC1", "S1", 1.0, 1.0)],
        );
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Disallowed).build(&network);
        assert!(matches!(
            GoodLpSolver::new().solve(&model),
            Err(EngineError::SolveFailed { .. })
        ));
    }

    #[test]
    fn test_tied_lanes_return_vertex_solution() {
        let network = NetworkConfig::baseline(
            vec![
                DistributionCenter::new("DC1", 100.0),
                DistributionCenter::new("DC2", 100.0),
            ],
            vec![Store::new("S1", 100.0, "East")],
            vec![
                Lane::new("DC1", "S1", 1.0, 1.0),
                Lane::new("DC2", "S1", 1.0, 1.0),
            ],
        );
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        let raw = GoodLpSolver::new().solve(&model).unwrap();

        // 等价最优解中取一个顶点,不在两条线路间平分
        let (x1, x2) = (raw.values[0], raw.values[1]);
        assert!((x1 + x2 - 100.0).abs() < 1e-9);
        assert!(x1.abs() < 1e-9 || x2.abs() < 1e-9);
        assert!(raw.values[2].abs() < 1e-9);
    }

    #[test]
    fn test_single_lane_solution() {
        let network = NetworkConfig::baseline(
            vec![DistributionCenter::new("DC1", 100.0)],
            vec![Store::new("S1", 40.0, "East")],
            vec![Lane::new("DC1", "S1", 2.0, 1.0)],
        );
        let model = FlowModelBuilder::new(UnmetDemandPolicy::Penalized(10.0)).build(&network);
        let raw = GoodLpSolver::new().solve(&model).unwrap();
        assert_eq!(raw.values.len(), 2);
        assert!((raw.values[0] - 40.0).abs() < 1e-4);
        assert!(raw.values[1].abs() < 1e-4);
        assert!((raw.objective_value - 80.0).abs() < 1e-3);
    }
}
