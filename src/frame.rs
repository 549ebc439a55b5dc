use crate::bbox::{BBox, Ltrb};
use crate::detection::{ActorClass, Detection};

/// One frame's tracker output split by actor class.
#[derive(Debug, Clone, Default)]
pub struct FrameDetections {
    pub index: usize,
    pub players: Vec<Detection>,
    pub referees: Vec<Detection>,
    pub ball: Option<BBox<Ltrb>>,
}

impl FrameDetections {
    pub fn partition(index: usize, detections: Vec<Detection>) -> Self {
        let mut frame = Self {
            index,
            ..Default::default()
        };
        let mut best_ball: Option<Detection> = None;

        for det in detections {
            match det.class {
                ActorClass::Player => frame.players.push(det),
                ActorClass::Referee => frame.referees.push(det),
                ActorClass::Ball => {
                    // first one wins on equal confidence
                    if best_ball.map_or(true, |b| det.confidence > b.confidence) {
                        best_ball = Some(det);
                    }
                }
            }
        }

        frame.ball = best_ball.map(|b| b.bbox);
        frame
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.players.len() + self.referees.len() + self.ball.is_some() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class: ActorClass, x: f32, confidence: f32) -> Detection {
        Detection::new(class, BBox::ltrb(x, 0.0, x + 10.0, 10.0), confidence, None)
    }

    #[test]
    fn partitions_by_class() {
        let frame = FrameDetections::partition(
            3,
            vec![
                det(ActorClass::Player, 0.0, 0.9),
                det(ActorClass::Referee, 20.0, 0.8),
                det(ActorClass::Player, 40.0, 0.7),
            ],
        );

        assert_eq!(frame.index, 3);
        assert_eq!(frame.players.len(), 2);
        assert_eq!(frame.referees.len(), 1);
        assert!(frame.ball.is_none());
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn keeps_most_confident_ball() {
        let frame = FrameDetections::partition(
            0,
            vec![
                det(ActorClass::Ball, 0.0, 0.4),
                det(ActorClass::Ball, 50.0, 0.9),
                det(ActorClass::Ball, 100.0, 0.9),
            ],
        );

        assert_eq!(frame.ball.unwrap().left(), 50.0);
    }
}
