// ==========================================
// 配送网络优化系统 - 命令行入口
// ==========================================
// 用法:
//   dc-flow-planner [--db <path>] import <dcs> <stores> <lanes>
//   dc-flow-planner [--db <path>] solve
//   dc-flow-planner [--db <path>] scenario '<levers json>'
//   dc-flow-planner [--db <path>] kpi [generation]
//   dc-flow-planner [--db <path>] export <dir> [generation]
//   dc-flow-planner [--db <path>] compare <baseline> <current>
//   dc-flow-planner [--db <path>] generations
// ==========================================

use dc_flow_planner::api::{GenerationSelector, PlannerApi};
use dc_flow_planner::domain::metrics::KpiRow;
use dc_flow_planner::domain::scenario::ScenarioLevers;
use dc_flow_planner::domain::solution::SolutionSnapshot;
use dc_flow_planner::logging;
use std::error::Error;
use std::path::PathBuf;

const USAGE: &str = "用法: dc-flow-planner [--db <path>] <import|solve|scenario|kpi|export|compare|generations> ...";

/// 默认数据库路径
///
/// 优先级: 环境变量 DC_FLOW_DB_PATH > 用户数据目录 > 当前目录
fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("DC_FLOW_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./dc_flow_planner.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("dc-flow-planner");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("dc_flow_planner.db");
        }
    }
    path.to_string_lossy().to_string()
}

fn parse_generation(arg: Option<&String>) -> Result<GenerationSelector, Box<dyn Error>> {
    match arg {
        None => Ok(GenerationSelector::Latest),
        Some(raw) if raw.eq_ignore_ascii_case("latest") => Ok(GenerationSelector::Latest),
        Some(raw) => Ok(GenerationSelector::Exact(
            raw.trim()
                .parse()
                .map_err(|_| format!("无效的代号: {}", raw))?,
        )),
    }
}

fn print_kpi_rows(generation: u64, rows: &[KpiRow]) {
    println!("generation={}", generation);
    for row in rows {
        println!("{:<32} {}", row.metric, row.value);
    }
}

fn print_snapshot_summary(snapshot: &SolutionSnapshot) {
    print_kpi_rows(snapshot.generation, &snapshot.metrics.kpis.to_rows());
    println!(
        "network_revision={} flows={} slow_lanes={}",
        snapshot.network_revision,
        snapshot.flows.len(),
        snapshot.metrics.slow_lane_kpis.slow_lane_count
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.iter().position(|a| a == "--db") {
        Some(idx) => {
            if idx + 1 >= args.len() {
                return Err("--db 缺少路径参数".into());
            }
            let path = args.remove(idx + 1);
            args.remove(idx);
            path
        }
        None => get_default_db_path(),
    };

    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    tracing::info!(
        version = dc_flow_planner::VERSION,
        db = %db_path,
        command = %command,
        "{}",
        dc_flow_planner::APP_NAME
    );
    let api = PlannerApi::new(&db_path)?;

    match command.as_str() {
        "import" => {
            let [dcs, stores, lanes] = rest else {
                return Err("import 需要三个文件: <dcs> <stores> <lanes>".into());
            };
            let network = api.import_network(dcs, stores, lanes)?;
            println!(
                "imported dcs={} stores={} lanes={}",
                network.dcs.len(),
                network.stores.len(),
                network.lanes.len()
            );
        }
        "solve" => {
            let snapshot = api.run_full()?;
            print_snapshot_summary(&snapshot);
        }
        "scenario" => {
            let raw = rest.first().ok_or("scenario 需要 JSON 杠杆参数")?;
            let levers = ScenarioLevers::from_json(raw)?;
            let outcome = api.run_scenario(&levers)?;
            print_snapshot_summary(&outcome.snapshot);
        }
        "kpi" => {
            let selector = parse_generation(rest.first())?;
            let generation = api.resolve_generation(selector)?;
            let rows = api.get_kpi_rows(GenerationSelector::Exact(generation))?;
            print_kpi_rows(generation, &rows);
        }
        "export" => {
            let dir = rest.first().ok_or("export 需要输出目录")?;
            let selector = parse_generation(rest.get(1))?;
            for path in api.export(selector, dir)? {
                println!("{}", path.display());
            }
        }
        "compare" => {
            let [baseline, current] = rest else {
                return Err("compare 需要两个代号: <baseline> <current>".into());
            };
            let cmp = api.compare_generations(
                parse_generation(Some(baseline))?,
                parse_generation(Some(current))?,
            )?;
            println!(
                "baseline={} current={}",
                cmp.baseline_generation, cmp.current_generation
            );
            for d in &cmp.deltas {
                let pct = d
                    .delta_pct
                    .map(|p| format!("{:+.2}%", p))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<32} {:>14.2} {:>14.2} {:>+14.2} {:>10}",
                    d.metric, d.baseline, d.current, d.delta, pct
                );
            }
        }
        "generations" => {
            for g in api.list_generations()? {
                println!(
                    "{}\trevision={}\t{}\t{}",
                    g.generation,
                    g.network_revision,
                    g.unmet_policy,
                    g.created_at.to_rfc3339()
                );
            }
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
        }
    }

    Ok(())
}
