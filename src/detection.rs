use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorClass {
    Player,
    Referee,
    Ball,
}

/// Raw detector class ids for each actor class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassMap {
    pub player: i32,
    pub referee: i32,
    pub ball: i32,
}

impl Default for ClassMap {
    fn default() -> Self {
        Self {
            player: 1,
            referee: 2,
            ball: 0,
        }
    }
}

impl ClassMap {
    pub fn classify(&self, class_id: i32) -> Option<ActorClass> {
        if class_id == self.player {
            Some(ActorClass::Player)
        } else if class_id == self.referee {
            Some(ActorClass::Referee)
        } else if class_id == self.ball {
            Some(ActorClass::Ball)
        } else {
            None
        }
    }
}

/// Detector output as it is stored on disk, corners in pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u32>,
}

impl RawDetection {
    pub fn resolve(&self, classes: &ClassMap) -> Option<Detection> {
        Some(Detection {
            class: classes.classify(self.class)?,
            bbox: BBox::ltrb(self.x1, self.y1, self.x2, self.y2),
            confidence: self.confidence,
            track_id: self.track_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class: ActorClass,
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub track_id: Option<u32>,
}

impl Detection {
    #[inline]
    pub fn new(class: ActorClass, bbox: BBox<Ltrb>, confidence: f32, track_id: Option<u32>) -> Self {
        Self {
            class,
            bbox,
            confidence,
            track_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_detection_maps_through_class_ids() {
        let raw: RawDetection =
            serde_json::from_str(r#"{"x1":1,"y1":2,"x2":3,"y2":4,"p":0.9,"c":2,"id":17}"#)
                .unwrap();
        let det = raw.resolve(&ClassMap::default()).unwrap();

        assert_eq!(det.class, ActorClass::Referee);
        assert_eq!(det.track_id, Some(17));
        assert_eq!(det.bbox.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn unknown_class_is_dropped() {
        let raw: RawDetection =
            serde_json::from_str(r#"{"x1":1,"y1":2,"x2":3,"y2":4,"p":0.9,"c":7}"#).unwrap();

        assert!(raw.track_id.is_none());
        assert!(raw.resolve(&ClassMap::default()).is_none());
    }
}
