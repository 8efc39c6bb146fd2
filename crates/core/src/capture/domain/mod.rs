pub mod acceptance_gate;
pub mod artifact;
pub mod artifact_sink;
pub mod capture_session;
pub mod coordinate_mapper;
pub mod quality_gate;
pub mod stability_tracker;
