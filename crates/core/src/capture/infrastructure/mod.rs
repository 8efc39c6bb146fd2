pub mod gallery;
pub mod jpeg_artifact_sink;
