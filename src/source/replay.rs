//! Replay of previously recorded stick readings

use tracing::debug;

use crate::source::{SampleSource, SourceError, StickReading};

/// Plays back a fixed list of readings, one per poll
#[derive(Debug, Clone)]
pub struct ReplaySource {
    readings: Vec<StickReading>,
    position: usize,
    rest_when_done: bool,
}

impl ReplaySource {
    pub fn new(readings: Vec<StickReading>) -> Self {
        debug!("Replay source with {} readings", readings.len());
        Self {
            readings,
            position: 0,
            rest_when_done: false,
        }
    }

    /// Keeps reporting a centred stick once the recording runs out instead of
    /// ending the stream
    pub fn then_rest(mut self) -> Self {
        self.rest_when_done = true;
        self
    }

    /// Parses an exported capture line (`x,y,x,y,...`)
    pub fn from_csv_line(line: &str) -> Result<Self, SourceError> {
        let values = line
            .trim()
            .split(',')
            .filter(|field| !field.trim().is_empty())
            .map(|field| {
                field
                    .trim()
                    .parse::<i8>()
                    .map_err(|e| SourceError::ParseError(format!("'{}': {}", field.trim(), e)))
            })
            .collect::<Result<Vec<i8>, SourceError>>()?;

        if values.len() % 2 != 0 {
            return Err(SourceError::ParseError(format!(
                "odd number of axis values ({})",
                values.len()
            )));
        }

        let readings = values
            .chunks_exact(2)
            .map(|pair| StickReading::new(pair[0], pair[1]))
            .collect();
        Ok(Self::new(readings))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl SampleSource for ReplaySource {
    fn read(&mut self) -> Result<StickReading, SourceError> {
        match self.readings.get(self.position) {
            Some(reading) => {
                self.position += 1;
                Ok(*reading)
            }
            None if self.rest_when_done => Ok(StickReading::default()),
            None => Err(SourceError::Exhausted),
        }
    }

    fn name(&self) -> String {
        format!("replay ({} readings)", self.readings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_then_exhausted() {
        let mut source = ReplaySource::new(vec![StickReading::new(1, 2)]);
        assert_eq!(source.read().unwrap(), StickReading::new(1, 2));
        assert!(matches!(source.read(), Err(SourceError::Exhausted)));
    }

    #[test]
    fn test_replay_then_rest() {
        let mut source = ReplaySource::new(vec![StickReading::new(60, -3)]).then_rest();
        assert_eq!(source.read().unwrap(), StickReading::new(60, -3));
        assert_eq!(source.read().unwrap(), StickReading::new(0, 0));
        assert_eq!(source.read().unwrap(), StickReading::new(0, 0));
    }

    #[test]
    fn test_parse_csv_line() {
        let source = ReplaySource::from_csv_line("10,5,-30,20,15,-25\n").unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.readings[1], StickReading::new(-30, 20));
    }

    #[test]
    fn test_parse_rejects_odd_count() {
        assert!(matches!(
            ReplaySource::from_csv_line("10,5,-30"),
            Err(SourceError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            ReplaySource::from_csv_line("10,500"),
            Err(SourceError::ParseError(_))
        ));
    }
}
