// Utility modules
pub mod logger;
pub mod network_diagnostics;
