use crate::bbox::{BBox, Ltrb};

/// Fills absent slots lying strictly between two known boxes.
///
/// Each coordinate is interpolated independently with the frame index as the
/// parameter. Leading and trailing gaps stay absent, nothing is extrapolated.
pub fn interpolate(track: &[Option<BBox<Ltrb>>]) -> Vec<Option<BBox<Ltrb>>> {
    let mut out = track.to_vec();
    let mut prev: Option<(usize, BBox<Ltrb>)> = None;

    for (idx, slot) in track.iter().enumerate() {
        let Some(bbox) = slot else {
            continue;
        };

        if let Some((pidx, pbox)) = prev {
            let span = (idx - pidx) as f32;
            for (gap, filled) in out[pidx + 1..idx].iter_mut().enumerate() {
                *filled = Some(pbox.lerp(bbox, (gap + 1) as f32 / span));
            }
        }

        prev = Some((idx, *bbox));
    }

    out
}

/// Per-frame ball boxes for the whole video, indexed by frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallTrack {
    slots: Vec<Option<BBox<Ltrb>>>,
}

impl BallTrack {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn push(&mut self, bbox: Option<BBox<Ltrb>>) {
        self.slots.push(bbox);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<BBox<Ltrb>> {
        self.slots.get(index).copied().flatten()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn known(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Option<BBox<Ltrb>>] {
        &self.slots
    }

    /// Replaces internal gaps in place; the length never changes.
    pub fn interpolate(&mut self) {
        self.slots = interpolate(&self.slots);
    }
}

impl From<Vec<Option<BBox<Ltrb>>>> for BallTrack {
    fn from(slots: Vec<Option<BBox<Ltrb>>>) -> Self {
        Self { slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(x: f32) -> Option<BBox<Ltrb>> {
        Some(BBox::ltrb(x, x * 2.0, x + 10.0, x * 2.0 + 10.0))
    }

    fn assert_box(actual: Option<BBox<Ltrb>>, expected: [f32; 4]) {
        let actual = actual.expect("slot should be filled");
        for (a, e) in actual.as_slice().iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-4, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn fills_internal_gap_linearly() {
        let out = interpolate(&[b(0.0), None, None, b(30.0)]);

        assert_eq!(out.len(), 4);
        assert_eq!(out[0], b(0.0));
        assert_box(out[1], [10.0, 20.0, 20.0, 30.0]);
        assert_box(out[2], [20.0, 40.0, 30.0, 50.0]);
        assert_eq!(out[3], b(30.0));
    }

    #[test]
    fn does_not_extrapolate_leading_gap() {
        let out = interpolate(&[None, None, b(5.0)]);
        assert_eq!(out, vec![None, None, b(5.0)]);
    }

    #[test]
    fn does_not_extrapolate_trailing_gap() {
        let out = interpolate(&[b(5.0), None]);
        assert_eq!(out, vec![b(5.0), None]);
    }

    #[test]
    fn handles_empty_and_all_absent() {
        assert!(interpolate(&[]).is_empty());
        assert_eq!(interpolate(&[None, None]), vec![None, None]);
    }

    #[test]
    fn track_interpolates_in_place() {
        let mut track = BallTrack::from(vec![None, b(0.0), None, b(20.0), None]);
        track.interpolate();

        assert_eq!(track.len(), 5);
        assert_eq!(track.known(), 3);
        assert!(track.get(0).is_none());
        assert_box(track.get(2), [10.0, 20.0, 20.0, 30.0]);
        assert!(track.get(4).is_none());
    }
}
