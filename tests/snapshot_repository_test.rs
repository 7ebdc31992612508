// ==========================================
// 解快照仓储集成测试
// ==========================================
// 测试目标: 整代写入、按代读取、排序与截断、历史清理
// ==========================================


use chrono::Utc;
use dc_flow_planner::config::OptimizerConfig;
use dc_flow_planner::domain::network::{DistributionCenter, Lane, NetworkConfig, Store};
use dc_flow_planner::domain::solution::{Flow, SolutionSnapshot, UnmetDemand};
use dc_flow_planner::domain::types::{SolveStatus, SortOrder, UnmetDemandPolicy};
use dc_flow_planner::engine::{DerivedMetricsBuilder, NetworkOptimizer};
use dc_flow_planner::repository::{RepositoryError, SnapshotRepository};
use test_helpers::{create_test_db, two_by_two_network};

fn solved_snapshot(generation: u64) -> SolutionSnapshot {
    NetworkOptimizer::new(OptimizerConfig::default())
        .optimize(&two_by_two_network(), generation)
        .expect("求解失败")
}

#[test]
fn test_generations_start_at_one() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();

    assert_eq!(repo.latest_generation().unwrap(), None);
    assert_eq!(repo.next_generation().unwrap(), 1);
    assert!(repo.list_generations().unwrap().is_empty());
}

#[test]
fn test_save_and_load_roundtrip() {
    println!("\n=== 测试：快照整代写入与还原 ===");

    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();

    let snapshot = solved_snapshot(repo.next_generation().unwrap());
    repo.save(&snapshot).unwrap();

    assert_eq!(repo.latest_generation().unwrap(), Some(1));
    assert_eq!(repo.next_generation().unwrap(), 2);

    let loaded = repo.load(1).unwrap();
    assert_eq!(loaded.snapshot_id, snapshot.snapshot_id);
    assert_eq!(loaded.network_revision, snapshot.network_revision);
    assert_eq!(loaded.status, snapshot.status);
    assert_eq!(loaded.unmet_policy, snapshot.unmet_policy);
    assert_eq!(loaded.objective_value, snapshot.objective_value);
    assert_eq!(loaded.flows, snapshot.flows);
    assert_eq!(loaded.unmet_demand, snapshot.unmet_demand);
    assert_eq!(loaded.metrics.dc_utilization, snapshot.metrics.dc_utilization);
    assert_eq!(loaded.metrics.cost_by_dc, snapshot.metrics.cost_by_dc);
    assert_eq!(loaded.metrics.cost_by_region, snapshot.metrics.cost_by_region);
    assert_eq!(
        loaded.metrics.stores_served_by_dc,
        snapshot.metrics.stores_served_by_dc
    );
    assert_eq!(loaded.metrics.slow_lanes, snapshot.metrics.slow_lanes);
    assert_eq!(loaded.metrics.slow_lane_kpis, snapshot.metrics.slow_lane_kpis);
    assert_eq!(loaded.metrics.kpis, snapshot.metrics.kpis);

    let info = repo.generation_info(1).unwrap();
    assert_eq!(info.snapshot_id, snapshot.snapshot_id);
    assert_eq!(info.slow_lane_threshold_days, 2.0);

    println!("✓ 第 1 代快照还原一致");
}

#[test]
fn test_slow_lane_units_reload_bit_identical() {
    println!("\n=== 测试：慢线路件数还原逐位一致 ===");

    // 件数降序累加 0.3+0.2+0.1 与 ID 序累加 0.1+0.2+0.3 的结果在末位不同
    let network = NetworkConfig::baseline(
        vec![DistributionCenter::new("DC1", 10.0)],
        vec![
            Store::new("S1", 0.1, "East"),
            Store::new("S2", 0.2, "East"),
            Store::new("S3", 0.3, "East"),
        ],
        vec![
            Lane::new("DC1", "S1", 1.0, 3.0),
            Lane::new("DC1", "S2", 1.0, 3.0),
            Lane::new("DC1", "S3", 1.0, 3.0),
        ],
    );
    let flows: Vec<Flow> = [("S1", 0.1), ("S2", 0.2), ("S3", 0.3)]
        .iter()
        .map(|(store, units)| Flow {
            dc_id: "DC1".to_string(),
            store_id: store.to_string(),
            units_assigned: *units,
            cost_per_unit: 1.0,
            flow_cost: *units,
        })
        .collect();
    let unmet: Vec<UnmetDemand> = ["S1", "S2", "S3"]
        .iter()
        .map(|store| UnmetDemand {
            store_id: store.to_string(),
            unmet_units: 0.0,
        })
        .collect();
    let metrics = DerivedMetricsBuilder::new(10.0, 2.0).build(&flows, &unmet, &network, SolveStatus::Optimal);
    assert_eq!(metrics.slow_lanes[0].store_id, "S3");
    assert_eq!(metrics.slow_lane_kpis.units_on_slow_lanes, 0.1 + 0.2 + 0.3);

    let snapshot = SolutionSnapshot {
        snapshot_id: "slow-lane-order".to_string(),
        generation: 1,
        network_revision: 0,
        status: SolveStatus::Optimal,
        unmet_policy: UnmetDemandPolicy::Penalized(10.0),
        objective_value: 0.6,
        flows,
        unmet_demand: unmet,
        metrics,
        created_at: Utc::now(),
    };

    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();
    repo.save(&snapshot).unwrap();

    let loaded = repo.load(1).unwrap();
    assert_eq!(loaded.metrics.slow_lanes, snapshot.metrics.slow_lanes);
    assert_eq!(loaded.metrics.slow_lane_kpis, snapshot.metrics.slow_lane_kpis);
    println!("✓ units_on_slow_lanes = {}", loaded.metrics.slow_lane_kpis.units_on_slow_lanes);
}

#[test]
fn test_kpi_rows_keep_insertion_order() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();
    let snapshot = solved_snapshot(1);
    repo.save(&snapshot).unwrap();

    let rows = repo.load_kpi_rows(1).unwrap();
    let expected = snapshot.metrics.kpis.to_rows();
    let metrics: Vec<&str> = rows.iter().map(|r| r.metric.as_str()).collect();
    let expected_metrics: Vec<&str> = expected.iter().map(|r| r.metric.as_str()).collect();
    assert_eq!(metrics, expected_metrics);

    let kpis = repo.load_kpis(1).unwrap();
    assert!((kpis.total_cost_with_penalty - 370.0).abs() < 0.01);
    assert_eq!(kpis.lp_status, "optimal");
}

#[test]
fn test_duplicate_generation_is_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();

    repo.save(&solved_snapshot(1)).unwrap();
    let result = repo.save(&solved_snapshot(1));
    assert!(result.is_err());

    // 失败的写入不留下半代数据
    assert_eq!(repo.list_generations().unwrap().len(), 1);
}

#[test]
fn test_missing_generation_is_not_found() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();

    match repo.load_flows(7) {
        Err(RepositoryError::NotFound { entity, id }) => {
            assert_eq!(entity, "SolutionSnapshot");
            assert_eq!(id, "7");
        }
        other => panic!("unexpected: {:?}", other.map(|f| f.len())),
    }
    assert!(repo.load(7).is_err());
    assert!(repo.load_kpis(7).is_err());
}

#[test]
fn test_ordering_and_top() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();
    repo.save(&solved_snapshot(1)).unwrap();

    // DC1 运费 120 > DC2 运费 50
    let by_dc = repo.load_cost_by_dc(1, SortOrder::Desc, None).unwrap();
    let ids: Vec<&str> = by_dc.iter().map(|c| c.dc_id.as_str()).collect();
    assert_eq!(ids, vec!["DC1", "DC2"]);

    let cheapest = repo.load_cost_by_dc(1, SortOrder::Asc, Some(1)).unwrap();
    assert_eq!(cheapest.len(), 1);
    assert_eq!(cheapest[0].dc_id, "DC2");

    // East 80, West 90
    let by_region = repo.load_cost_by_region(1, SortOrder::Desc, Some(1)).unwrap();
    assert_eq!(by_region[0].region, "West");

    // 两个 DC 均满载
    let util = repo.load_top_utilization(1, SortOrder::Desc, Some(5)).unwrap();
    assert_eq!(util.len(), 2);
    assert!(util.iter().all(|u| (u.utilization_pct - 100.0).abs() < 0.01));
    assert_eq!(util[0].dc_id, "DC1");

    let dc1_flows = repo.load_flows_for_dc(1, "DC1", Some(1)).unwrap();
    assert_eq!(dc1_flows.len(), 1);
    assert_eq!(dc1_flows[0].store_id, "S1");

    let served = repo.load_stores_served(1).unwrap();
    assert_eq!(served.len(), 2);
    assert_eq!(served[0].dc_id, "DC1");
    assert_eq!(served[0].stores_served, 2);
    assert_eq!(served[1].stores_served, 1);

    let slow = repo.load_slow_lanes(1, Some(5)).unwrap();
    assert_eq!(slow.len(), 1);
    assert_eq!((slow[0].dc_id.as_str(), slow[0].store_id.as_str()), ("DC1", "S2"));
}

#[test]
fn test_prune_keeps_recent_generations() {
    println!("\n=== 测试：历史代清理 ===");

    let (_temp, db_path) = create_test_db().unwrap();
    let repo = SnapshotRepository::new(&db_path).unwrap();
    for generation in 1..=3 {
        repo.save(&solved_snapshot(generation)).unwrap();
    }

    let removed = repo.prune_before(3).unwrap();
    assert_eq!(removed, 2);

    let remaining: Vec<u64> = repo
        .list_generations()
        .unwrap()
        .iter()
        .map(|g| g.generation)
        .collect();
    assert_eq!(remaining, vec![3]);
    assert!(!repo.generation_exists(1).unwrap());
    assert!(repo.load_flows(1).is_err());
    assert_eq!(repo.load_flows(3).unwrap().len(), 3);

    // 清理后代号继续递增
    assert_eq!(repo.next_generation().unwrap(), 4);
    println!("✓ 清理 {} 代", removed);
}
