use std::sync::Arc;

use crate::capture::domain::coordinate_mapper::to_oriented_rect;
use crate::detection::domain::detected_face::DetectedFace;
use crate::pipeline::broadcast::{Broadcast, Subscription};
use crate::shared::frame::FrameGeometry;
use crate::shared::normalized_rect::NormalizedRect;

/// Face rectangles of one frame, as percentages of the oriented frame.
pub type FaceBounds = Vec<NormalizedRect>;

/// Republishes every analysed frame's face rectangles for overlay display.
///
/// Independent of capture decisions: frames with zero, one or many faces
/// are all published, whether or not captures are still needed. Cloning
/// yields another handle to the same broadcast.
#[derive(Clone, Default)]
pub struct BoundsPublisher {
    channel: Arc<Broadcast<FaceBounds>>,
}

impl BoundsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<FaceBounds> {
        self.channel.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.channel.is_active()
    }

    /// Maps and publishes the frame's faces; returns how many subscribers
    /// received them.
    pub fn publish(&self, faces: &[DetectedFace], geometry: &FrameGeometry) -> usize {
        let bounds: FaceBounds = faces
            .iter()
            .map(|face| {
                let rect = to_oriented_rect(&face.bounding_box, geometry);
                log::trace!(
                    "face {}x{} @ {}x{} r{} -> {}x{}%",
                    face.bounding_box.width(),
                    face.bounding_box.height(),
                    geometry.oriented_width(),
                    geometry.oriented_height(),
                    geometry.rotation_degrees,
                    rect.width(),
                    rect.height()
                );
                rect
            })
            .collect();
        self.channel.publish(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detected_face::BoundingBox;

    fn face(left: i32, top: i32, right: i32, bottom: i32) -> DetectedFace {
        DetectedFace::new(BoundingBox::new(left, top, right, bottom))
    }

    #[test]
    fn test_publishes_oriented_percentages() {
        let publisher = BoundsPublisher::new();
        let sub = publisher.subscribe();
        let geometry = FrameGeometry::new(640, 480, 90);
        publisher.publish(&[face(48, 64, 240, 320)], &geometry);
        assert_eq!(sub.try_recv().unwrap(), vec![NormalizedRect::new(10, 10, 50, 50)]);
    }

    #[test]
    fn test_publishes_empty_and_multiple_face_frames() {
        let publisher = BoundsPublisher::new();
        let sub = publisher.subscribe();
        let geometry = FrameGeometry::new(100, 100, 0);

        publisher.publish(&[], &geometry);
        assert!(sub.try_recv().unwrap().is_empty());

        publisher.publish(&[face(0, 0, 10, 10), face(50, 50, 60, 60)], &geometry);
        assert_eq!(sub.try_recv().unwrap().len(), 2);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let publisher = BoundsPublisher::new();
        let handle = publisher.clone();
        let sub = handle.subscribe();
        assert!(publisher.is_active());
        assert_eq!(publisher.publish(&[], &FrameGeometry::new(10, 10, 0)), 1);
        drop(sub);
        assert!(!publisher.is_active());
    }
}
