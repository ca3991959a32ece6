pub mod report;
pub mod service;

pub use report::{AnalysisReport, ImportSummary};
pub use service::{RecordError, VitalsMonitor, WindowSupplier};
