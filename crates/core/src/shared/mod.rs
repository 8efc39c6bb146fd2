pub mod constants;
pub mod frame;
pub mod latest_channel;
pub mod normalized_rect;
