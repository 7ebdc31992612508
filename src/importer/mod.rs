// ==========================================
// 配送网络优化系统 - 导入导出层
// ==========================================
// 职责: 外部表格 → 网络参考数据; 解快照 → CSV 数据集
// ==========================================

pub mod error;
pub mod exporter;
pub mod file_parser;
pub mod network_importer;

pub use error::{ImportError, ImportResult};
pub use exporter::SnapshotExporter;
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use network_importer::NetworkImporter;
