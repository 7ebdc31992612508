// ==========================================
// 配送网络优化系统 - 配置层
// ==========================================
// 职责: 优化器参数默认值 + config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod optimizer_config;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use optimizer_config::OptimizerConfig;
