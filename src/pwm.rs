/** An IR pulse-distance timing table with configurable pulse length and acceptance bands */
use std::{collections::HashMap, hash::Hash, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rule {
    /// Duration emitted when encoding
    pub duration: Duration,
    /// Exclusive lower bound accepted when decoding
    pub min: Duration,
    /// Exclusive upper bound accepted when decoding
    pub max: Duration,
}

impl Rule {
    pub fn new(duration: Duration) -> Self {
        // Use a 20% tolerance by default
        let tolerance = duration / 5;
        Self {
            duration,
            min: duration.saturating_sub(tolerance),
            max: duration + tolerance,
        }
    }

    pub fn banded(duration: Duration, min: Duration, max: Duration) -> Self {
        Self { duration, min, max }
    }

    pub fn matches(&self, duration: Duration) -> bool {
        self.min < duration && duration < self.max
    }
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodecError<T: Copy + std::fmt::Debug> {
    #[error("a pulse was missing from the rule set: {0:?}")]
    InvalidPulse(T),
}

pub struct Codec<TPulse> {
    rules: HashMap<TPulse, Rule>,
    sorted_rules: Vec<(TPulse, Rule)>,
}

impl<T: Copy + Eq + Hash + std::fmt::Debug> Codec<T> {
    pub fn new(rules: impl Iterator<Item = (T, Rule)>) -> Self {
        let mut sorted_rules: Vec<_> = rules.collect();
        sorted_rules.sort_by_key(|f| f.1.duration);

        let rules = sorted_rules.iter().copied().collect();

        Self {
            sorted_rules,
            rules,
        }
    }

    /// Returns the first pulse, by ascending duration, whose band contains `duration`.
    pub fn classify(&self, duration: Duration) -> Option<T> {
        self.sorted_rules
            .iter()
            .find(|(_, r)| r.matches(duration))
            .map(|(p, _)| *p)
    }

    /// Like [`Codec::classify`] but restricted to the given candidates.
    pub fn classify_among(&self, duration: Duration, candidates: &[T]) -> Option<T> {
        self.sorted_rules
            .iter()
            .filter(|(p, _)| candidates.contains(p))
            .find(|(_, r)| r.matches(duration))
            .map(|(p, _)| *p)
    }

    pub fn encode(&self, pulses: impl Iterator<Item = T>) -> Result<Vec<Duration>, CodecError<T>> {
        pulses
            .map(|p| self.encode_pulse(p).ok_or(CodecError::InvalidPulse(p)))
            .collect()
    }

    pub fn encode_pulse(&self, pulse: T) -> Option<Duration> {
        self.rules.get(&pulse).map(|r| r.duration)
    }

    pub fn rule(&self, pulse: T) -> Option<&Rule> {
        self.rules.get(&pulse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
    enum Pulse {
        Short,
        Long,
        Missing,
    }

    fn get_codec() -> Codec<Pulse> {
        let rules = [
            (Pulse::Long, Rule::new(Duration::from_micros(500))),
            (
                Pulse::Short,
                Rule::banded(
                    Duration::from_micros(100),
                    Duration::from_micros(50),
                    Duration::from_micros(150),
                ),
            ),
        ];
        Codec::new(rules.into_iter())
    }

    #[test]
    fn test_classify() {
        let codec = get_codec();
        let classified: Vec<_> = [100, 149, 150, 420, 599, 600]
            .map(Duration::from_micros)
            .into_iter()
            .map(|d| codec.classify(d))
            .collect();
        assert_eq!(
            classified,
            vec![
                Some(Pulse::Short),
                Some(Pulse::Short),
                None,
                Some(Pulse::Long),
                Some(Pulse::Long),
                None,
            ]
        );

        assert_eq!(
            codec.classify_among(Duration::from_micros(100), &[Pulse::Long]),
            None
        );
    }

    #[test]
    fn test_encode() {
        let pulses = [Pulse::Short, Pulse::Long, Pulse::Long, Pulse::Short];

        let encoded = get_codec().encode(pulses.into_iter()).unwrap();
        assert_eq!(
            encoded,
            [100, 500, 500, 100].map(Duration::from_micros).to_vec()
        );

        assert_eq!(
            get_codec().encode([Pulse::Missing].into_iter()),
            Err(CodecError::InvalidPulse(Pulse::Missing))
        );
    }
}
