pub mod bounds_publisher;
pub mod broadcast;
pub mod capture_config;
pub mod capture_orchestrator;
pub mod capture_runner;
pub mod frame_analyzer;
pub mod infrastructure;
pub mod pipeline_logger;
