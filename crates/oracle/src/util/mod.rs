pub mod audit;
pub mod logging;

pub use audit::AuditLogger;
pub use logging::LogConfig;
