use crate::pwm::{Codec, CodecError, Rule};

use super::layout::FrameBuffer;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Symbolic pulses of the Daikin protocol
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PulseType {
    BitMark,
    Zero,
    One,
    LeaderSpace,
    FrameStartMark,
    FrameStartSpace,
    Gap,
}

impl PulseType {
    pub fn carrier(self) -> Carrier {
        match self {
            PulseType::BitMark | PulseType::FrameStartMark => Carrier::On,
            _ => Carrier::Off,
        }
    }
}

// Code timings (In us)
pub const BIT_MARK: Duration = Duration::from_micros(425);
pub const ZERO: Duration = Duration::from_micros(445);
pub const ONE: Duration = Duration::from_micros(1295);
pub const LEADER_SPACE: Duration = Duration::from_micros(25400);
pub const FRAME_START_MARK: Duration = Duration::from_micros(3490);
pub const FRAME_START_SPACE: Duration = Duration::from_micros(1720);
pub const GAP: Duration = Duration::from_micros(34950);

const PREAMBLE_BITS: usize = 6;

/// Space pulses the decoder looks for; marks are never classified.
const SPACES: [PulseType; 4] = [
    PulseType::Zero,
    PulseType::One,
    PulseType::LeaderSpace,
    PulseType::Gap,
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Carrier {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pulse {
    pub carrier: Carrier,
    pub duration: Duration,
}

/// Output level of the receiver. Demodulating receivers are active low, the
/// line is pulled low while the carrier is present.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl From<Carrier> for Level {
    fn from(carrier: Carrier) -> Self {
        match carrier {
            Carrier::On => Level::Low,
            Carrier::Off => Level::High,
        }
    }
}

/// A transition of the receiver output, timestamped with a wrapping microsecond counter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Edge {
    pub level: Level,
    pub timestamp: u32,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhyError {
    #[error("PWM error: {0}")]
    PWMError(#[from] CodecError<PulseType>),
}

pub struct Phy {
    codec: Codec<PulseType>,
}

impl Default for Phy {
    fn default() -> Self {
        Phy::new()
    }
}

impl Phy {
    pub fn new() -> Self {
        let us = Duration::from_micros;
        let codec = Codec::new(
            [
                (PulseType::BitMark, Rule::new(BIT_MARK)),
                (PulseType::Zero, Rule::banded(ZERO, us(340), us(500))),
                (PulseType::One, Rule::banded(ONE, us(1200), us(1400))),
                (
                    PulseType::LeaderSpace,
                    Rule::banded(LEADER_SPACE, us(25200), us(25600)),
                ),
                (PulseType::FrameStartMark, Rule::new(FRAME_START_MARK)),
                (PulseType::FrameStartSpace, Rule::new(FRAME_START_SPACE)),
                (PulseType::Gap, Rule::banded(GAP, us(34700), us(35100))),
            ]
            .into_iter(),
        );

        Self { codec }
    }

    pub fn encode(&self, buffer: &FrameBuffer) -> Result<Vec<Pulse>, PhyError> {
        let symbols = self.encode_pulses(buffer);
        let durations = self.codec.encode(symbols.iter().copied())?;

        Ok(symbols
            .into_iter()
            .zip(durations)
            .map(|(symbol, duration)| Pulse {
                carrier: symbol.carrier(),
                duration,
            })
            .collect())
    }

    /// Expected number of pulses for a complete transmission of `buffer`.
    pub fn pulse_count(buffer: &FrameBuffer) -> usize {
        let frames = buffer.frames();
        2 * PREAMBLE_BITS + 1 + 3 * frames.len() + 16 * buffer.as_bytes().len() + frames.len()
    }

    pub fn encode_pulses(&self, buffer: &FrameBuffer) -> Vec<PulseType> {
        let mut pulses = Vec::with_capacity(Phy::pulse_count(buffer));

        for _ in 0..PREAMBLE_BITS {
            pulses.push(PulseType::Zero);
            pulses.push(PulseType::BitMark);
        }
        pulses.push(PulseType::Gap);

        for frame in buffer.frames() {
            pulses.push(PulseType::FrameStartMark);
            pulses.push(PulseType::FrameStartSpace);
            pulses.push(PulseType::BitMark);

            Phy::append_bytes(frame, &mut pulses);

            pulses.push(PulseType::Gap);
        }

        pulses
    }

    /// Bytes are sent least significant bit first, each bit is a space followed by a mark.
    fn append_bytes(bytes: &[u8], pulses: &mut Vec<PulseType>) {
        for byte in bytes {
            for bit in 0..8 {
                pulses.push(if byte >> bit & 1 == 1 {
                    PulseType::One
                } else {
                    PulseType::Zero
                });
                pulses.push(PulseType::BitMark);
            }
        }
    }

    /// Reconstructs byte frames from a captured edge stream.
    ///
    /// Unrecognized gaps are skipped, capture is lossy by nature. Checksums
    /// are not verified here, callers feeding the output back into command
    /// logic must do it themselves.
    pub fn decode_edges(&self, edges: &[Edge]) -> Vec<Vec<u8>> {
        let mut frames: Vec<Vec<bool>> = Vec::new();
        let mut frame: Vec<bool> = Vec::new();

        for pair in edges.windows(2) {
            let (prev, edge) = (pair[0], pair[1]);
            let gap = Duration::from_micros(edge.timestamp.wrapping_sub(prev.timestamp) as u64);

            match self.codec.classify_among(gap, &SPACES) {
                Some(PulseType::LeaderSpace) => frame.clear(),
                Some(PulseType::Gap) => frames.push(std::mem::take(&mut frame)),
                // Bits are measured on the space preceding a mark
                Some(PulseType::Zero) if edge.level == Level::Low => frame.push(false),
                Some(PulseType::One) if edge.level == Level::Low => frame.push(true),
                _ => trace!(?gap, level = ?edge.level, "skipping gap"),
            }
        }
        frames.push(frame);

        frames
            .iter()
            .map(|bits| Phy::pack_bits(bits))
            .filter(|bytes| !bytes.is_empty())
            .collect()
    }

    /// Packs bits least significant first, trailing bits that don't complete a byte are dropped.
    fn pack_bits(bits: &[bool]) -> Vec<u8> {
        bits.chunks_exact(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | (bit as u8) << i)
            })
            .collect()
    }

    /// Decodes a raw capture of alternating mark/space durations, starting with a mark.
    pub fn decode_durations(&self, durations: impl Iterator<Item = Duration>) -> Vec<Vec<u8>> {
        let pulses: Vec<Pulse> = durations
            .enumerate()
            .map(|(i, duration)| Pulse {
                carrier: if i % 2 == 0 { Carrier::On } else { Carrier::Off },
                duration,
            })
            .collect();
        self.decode_edges(&Phy::pulses_to_edges(&pulses, 0))
    }

    /// Edges an active low receiver reports while `pulses` are emitted, the
    /// line idling high before the first pulse.
    pub fn pulses_to_edges(pulses: &[Pulse], start: u32) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(pulses.len());
        let mut level = Level::High;
        let mut now = start;

        for pulse in pulses {
            let next = Level::from(pulse.carrier);
            if next != level {
                edges.push(Edge {
                    level: next,
                    timestamp: now,
                });
                level = next;
            }
            now = now.wrapping_add(pulse.duration.as_micros() as u32);
        }

        edges
    }
}
