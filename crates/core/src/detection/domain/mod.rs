pub mod detected_face;
pub mod frame_source;
