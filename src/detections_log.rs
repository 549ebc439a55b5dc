use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::detection::{ClassMap, Detection, RawDetection};
use crate::error::Error;
use crate::source::Detector;

/// Tracker output recorded ahead of time, one JSON line per frame.
///
/// Lines look like `<frame_index>: [{"x1":..,"y1":..,"x2":..,"y2":..,"p":..,"c":..,"id":..}, ...]`.
/// A bare JSON array is also accepted and takes its line number as the frame index.
#[derive(Debug, Clone, Default)]
pub struct DetectionsLog {
    frames: HashMap<usize, Vec<RawDetection>>,
    classes: ClassMap,
}

fn parse_line(line_no: usize, line: &str) -> Result<(usize, Vec<RawDetection>), String> {
    let (index, body) = match line.find(':') {
        Some(idx) if !line[..idx].trim_start().starts_with('[') => {
            let (head, tail) = line.split_at(idx);
            let index = head
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("bad frame index {:?}: {}", head.trim(), e))?;
            (index, &tail[1..])
        }
        _ => (line_no, line),
    };

    let dets = serde_json::from_str(body.trim()).map_err(|e| e.to_string())?;

    Ok((index, dets))
}

impl DetectionsLog {
    pub fn from_reader<R: BufRead>(reader: R, classes: ClassMap) -> Result<Self, Error> {
        let mut frames = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(line_no, &line) {
                Ok((index, dets)) => {
                    frames.insert(index, dets);
                }
                Err(reason) => warn!("detections log line {} skipped: {}", line_no + 1, reason),
            }
        }

        Ok(Self { frames, classes })
    }

    pub fn open<P: AsRef<Path>>(path: P, classes: ClassMap) -> Result<Self, Error> {
        let path = path.as_ref();
        let log = Self::from_reader(BufReader::new(File::open(path)?), classes)?;
        info!("loaded detections for {} frames from {}", log.frames.len(), path.display());

        Ok(log)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Vec<Detection> {
        self.frames
            .get(&index)
            .map(|dets| dets.iter().filter_map(|d| d.resolve(&self.classes)).collect())
            .unwrap_or_default()
    }
}

impl<F> Detector<F> for DetectionsLog {
    #[inline]
    fn detect(&mut self, index: usize, _frame: &F) -> Result<Vec<Detection>, Error> {
        Ok(self.frame(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ActorClass;

    const LOG: &str = r#"0: [{"x1":10,"y1":20,"x2":30,"y2":60,"p":0.9,"c":1,"id":4},{"x1":5,"y1":5,"x2":9,"y2":9,"p":0.5,"c":0}]
1: []
garbage line
3: [{"x1":1,"y1":1,"x2":2,"y2":2,"p":0.3,"c":42}]
"#;

    #[test]
    fn parses_indexed_lines() {
        let log = DetectionsLog::from_reader(LOG.as_bytes(), ClassMap::default()).unwrap();

        assert_eq!(log.len(), 3);

        let frame = log.frame(0);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0].class, ActorClass::Player);
        assert_eq!(frame[0].track_id, Some(4));
        assert_eq!(frame[1].class, ActorClass::Ball);

        assert!(log.frame(1).is_empty());
        // unknown class ids are dropped
        assert!(log.frame(3).is_empty());
        // missing frames have no detections
        assert!(log.frame(99).is_empty());
    }

    #[test]
    fn bare_arrays_use_line_numbers() {
        let text = "[]\n[{\"x1\":1,\"y1\":1,\"x2\":2,\"y2\":2,\"p\":0.3,\"c\":2}]\n";
        let mut log = DetectionsLog::from_reader(text.as_bytes(), ClassMap::default()).unwrap();

        let dets = Detector::<()>::detect(&mut log, 1, &()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, ActorClass::Referee);
    }
}
