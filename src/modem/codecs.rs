use std::{str::FromStr, time::Duration};

use thiserror::Error;

use crate::daikin::{Carrier, Edge, Level, Pulse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CodecType {
    /// `+mark -space` durations in microseconds, optionally wrapped as `Freq=38000Hz[...]`
    Raw,
    /// One `level timestamp` pair per line, as dumped by an edge capture
    Edges,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to decode raw string")]
    RawParseError,
    #[error("invalid edge on line {line}: {reason}")]
    EdgeParseError { line: usize, reason: String },
    #[error("empty input")]
    EmptyInput,
}

/// A capture read from text, either as durations or as timestamped edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Durations(Vec<Duration>),
    Edges(Vec<Edge>),
}

pub trait Codec {
    fn decode(&self, input: &str) -> Result<Capture, CodecError>;
    fn encode(&self, pulses: &[Pulse]) -> String;
}

pub fn create_codec(ty: CodecType) -> Box<dyn Codec + Send> {
    match ty {
        CodecType::Raw => Box::new(Raw),
        CodecType::Edges => Box::new(EdgeLog),
    }
}

pub struct Raw;
impl Codec for Raw {
    fn decode(&self, input: &str) -> Result<Capture, CodecError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        // Support IrTransmogrifier's format which looks like `Freq=38400Hz[.....][...]`
        let input = if input.starts_with("Freq=") {
            let mut parts = input.splitn(2, '[');
            parts.next();
            let untrimmed = parts.next().ok_or(CodecError::RawParseError)?;
            untrimmed.split(']').next().ok_or(CodecError::RawParseError)?
        } else {
            input
        };

        let msg = irp::Message::parse(input).or(Err(CodecError::RawParseError))?;
        Ok(Capture::Durations(
            msg.raw
                .into_iter()
                .map(|t| Duration::from_micros(t as _))
                .collect(),
        ))
    }

    /// Leading spaces are dropped, a receiver only sees the signal from the first mark.
    fn encode(&self, pulses: &[Pulse]) -> String {
        pulses
            .iter()
            .skip_while(|p| p.carrier == Carrier::Off)
            .map(|p| {
                let sign = match p.carrier {
                    Carrier::On => '+',
                    Carrier::Off => '-',
                };
                format!("{}{}", sign, p.duration.as_micros())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct EdgeLog;
impl EdgeLog {
    fn parse_line(line: &str) -> Result<Edge, String> {
        let mut parts = line.split_whitespace();
        let level = match parts.next() {
            Some("0") => Level::Low,
            Some("1") => Level::High,
            Some(other) => return Err(format!("unknown level {:?}", other)),
            None => return Err("missing level".into()),
        };
        let timestamp = parts
            .next()
            .ok_or("missing timestamp")
            .map(u32::from_str)?
            .map_err(|e| e.to_string())?;

        Ok(Edge { level, timestamp })
    }

    pub fn format(edges: &[Edge]) -> String {
        edges
            .iter()
            .map(|e| {
                let level = match e.level {
                    Level::Low => 0,
                    Level::High => 1,
                };
                format!("{} {}", level, e.timestamp)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Codec for EdgeLog {
    fn decode(&self, input: &str) -> Result<Capture, CodecError> {
        let edges = input
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .map(|(i, l)| {
                EdgeLog::parse_line(l).map_err(|reason| CodecError::EdgeParseError {
                    line: i + 1,
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if edges.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(Capture::Edges(edges))
    }

    fn encode(&self, pulses: &[Pulse]) -> String {
        EdgeLog::format(&crate::daikin::Phy::pulses_to_edges(pulses, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daikin::{encode, ClimateCommand, Phy, BIT_MARK, ONE, ZERO};

    #[test]
    fn test_raw_encode() {
        let pulses = [
            Pulse {
                carrier: Carrier::Off,
                duration: ZERO,
            },
            Pulse {
                carrier: Carrier::On,
                duration: BIT_MARK,
            },
            Pulse {
                carrier: Carrier::Off,
                duration: ONE,
            },
        ];
        assert_eq!(Raw.encode(&pulses), "+425 -1295");
    }

    #[test]
    fn test_edges_round_trip() {
        let phy = Phy::new();
        let buffer = encode(&ClimateCommand::default()).unwrap();
        let pulses = phy.encode(&buffer).unwrap();

        let text = EdgeLog.encode(&pulses);
        assert!(text.starts_with("0 445\n1 870\n"));

        let edges = match EdgeLog.decode(&text).unwrap() {
            Capture::Edges(edges) => edges,
            other => panic!("unexpected capture {:?}", other),
        };
        assert_eq!(edges, Phy::pulses_to_edges(&pulses, 0));
    }

    #[test]
    fn test_edges_errors() {
        assert_eq!(EdgeLog.decode("\n\n"), Err(CodecError::EmptyInput));
        assert_eq!(
            EdgeLog.decode("# capture\n0 100\n2 200"),
            Err(CodecError::EdgeParseError {
                line: 3,
                reason: "unknown level \"2\"".into()
            })
        );
        assert!(matches!(
            EdgeLog.decode("0 abc"),
            Err(CodecError::EdgeParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_raw_empty() {
        assert_eq!(Raw.decode("   "), Err(CodecError::EmptyInput));
    }
}
