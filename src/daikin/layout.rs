use std::fmt;

use thiserror::Error;

pub const FRAME_1_SIZE: usize = 8;
pub const FRAME_2_SIZE: usize = 8;
pub const FRAME_3_SIZE: usize = 19;
pub const BUFFER_SIZE: usize = FRAME_1_SIZE + FRAME_2_SIZE + FRAME_3_SIZE;

/// Byte ranges of the three frames inside the buffer.
pub const FRAMES: [std::ops::Range<usize>; 3] = [
    0..FRAME_1_SIZE,
    FRAME_1_SIZE..FRAME_1_SIZE + FRAME_2_SIZE,
    FRAME_1_SIZE + FRAME_2_SIZE..BUFFER_SIZE,
];

// Power off, fan only, 25C, fan auto, everything else off
pub const DEFAULT_STATE: [u8; BUFFER_SIZE] = [
    0x11, 0xda, 0x27, 0x00, 0xc5, 0x10, 0x00, 0xe7, //
    0x11, 0xda, 0x27, 0x00, 0x42, 0x00, 0x08, 0x5c, //
    0x11, 0xda, 0x27, 0x00, 0x00, 0x68, 0x32, 0x00, 0xa0, 0x00, 0x00, 0x06, 0x60, 0x00, 0x00,
    0xc1, 0x00, 0x00, 0x73,
];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("value {value} does not fit in field {field}")]
    OutOfRange { field: Field, value: u32 },

    #[error("frame buffer must be 35 bytes, got {0}")]
    InvalidLength(usize),
}

/// Location of a value inside the frame buffer.
///
/// `offset` is absolute within the 35 byte buffer. Fields wider than the
/// remaining bits of their first byte continue into the following bytes,
/// little-endian: bit 0 of the field is the least significant bit of the
/// first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub bit: u8,
    pub len: u8,
}

impl Field {
    const fn new(name: &'static str, offset: usize, bit: u8, len: u8) -> Self {
        Self {
            name,
            offset,
            bit,
            len,
        }
    }

    pub fn max(&self) -> u32 {
        ((1u64 << self.len) - 1) as u32
    }

    /// Number of bytes touched by this field
    fn span(&self) -> usize {
        (self.bit as usize + self.len as usize + 7) / 8
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// Frame 1
pub const COMFORT: Field = Field::new("Comfort", 6, 4, 1);
pub const SUM_1: Field = Field::new("Sum1", 7, 0, 8);

// Frame 2
pub const TIME: Field = Field::new("Time", 13, 0, 11); // Minutes past midnight
pub const DAY_OF_WEEK: Field = Field::new("DayOfWeek", 13, 11, 3); // Sunday = 1
pub const SUM_2: Field = Field::new("Sum2", 15, 0, 8);

// Frame 3
pub const POWER: Field = Field::new("Power", 21, 0, 1);
pub const HIGH_BIT: Field = Field::new("HighBit", 21, 3, 1); // Always 1
pub const MODE: Field = Field::new("Mode", 21, 4, 3);
pub const TEMPERATURE: Field = Field::new("Temperature", 22, 1, 7);
pub const SWING_V: Field = Field::new("SwingV", 24, 0, 4);
pub const FAN: Field = Field::new("Fan", 24, 4, 4);
pub const SWING_H: Field = Field::new("SwingH", 25, 0, 4);
pub const POWERFUL: Field = Field::new("Powerful", 29, 0, 1);
pub const QUIET: Field = Field::new("Quiet", 29, 5, 1);
pub const SENSOR: Field = Field::new("Sensor", 32, 1, 1);
pub const ECONO: Field = Field::new("Econo", 32, 2, 1);
pub const SUM_3: Field = Field::new("Sum3", 34, 0, 8);

pub const FIELDS: [Field; 17] = [
    COMFORT,
    SUM_1,
    TIME,
    DAY_OF_WEEK,
    SUM_2,
    POWER,
    HIGH_BIT,
    MODE,
    TEMPERATURE,
    SWING_V,
    FAN,
    SWING_H,
    POWERFUL,
    QUIET,
    SENSOR,
    ECONO,
    SUM_3,
];

/// The raw 35 byte command, split into frames of 8, 8 and 19 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer([u8; BUFFER_SIZE]);

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer(DEFAULT_STATE)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrameBuffer")
            .field(&self.frames().map(hex::encode))
            .finish()
    }
}

impl FrameBuffer {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        let raw = bytes
            .try_into()
            .map_err(|_| LayoutError::InvalidLength(bytes.len()))?;
        Ok(FrameBuffer(raw))
    }

    /// Reassembles a buffer from decoded frames, which must have the expected sizes.
    pub fn from_frames<F: AsRef<[u8]>>(frames: &[F]) -> Result<Self, LayoutError> {
        let bytes: Vec<u8> = frames
            .iter()
            .flat_map(|f| f.as_ref().iter().copied())
            .collect();
        let sizes_match = frames.len() == FRAMES.len()
            && frames
                .iter()
                .zip(FRAMES.iter())
                .all(|(f, r)| f.as_ref().len() == r.len());
        if !sizes_match {
            return Err(LayoutError::InvalidLength(bytes.len()));
        }
        FrameBuffer::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BUFFER_SIZE] {
        &self.0
    }

    pub fn frame(&self, index: usize) -> &[u8] {
        &self.0[FRAMES[index].clone()]
    }

    pub fn frames(&self) -> [&[u8]; 3] {
        [self.frame(0), self.frame(1), self.frame(2)]
    }

    pub fn get(&self, field: Field) -> u32 {
        get_field(&self.0, field)
    }

    pub fn set(&mut self, field: Field, value: u32) -> Result<(), LayoutError> {
        set_field(&mut self.0, field, value)
    }
}

/// Reads `field` from `buffer`.
pub fn get_field(buffer: &[u8], field: Field) -> u32 {
    let word = buffer[field.offset..field.offset + field.span()]
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64);

    ((word >> field.bit) & field.max() as u64) as u32
}

/// Writes `value` into `field`, leaving every other bit untouched.
pub fn set_field(buffer: &mut [u8], field: Field, value: u32) -> Result<(), LayoutError> {
    if value > field.max() {
        return Err(LayoutError::OutOfRange { field, value });
    }

    let bytes = &mut buffer[field.offset..field.offset + field.span()];
    let mask = (field.max() as u64) << field.bit;
    let value = (value as u64) << field.bit;

    for (i, byte) in bytes.iter_mut().enumerate() {
        let shift = 8 * i;
        let byte_mask = (mask >> shift) as u8;
        *byte = (*byte & !byte_mask) | ((value >> shift) as u8 & byte_mask);
    }

    Ok(())
}

/// Per-frame additive checksum stored in the last byte of each frame.
pub struct Checksum;

impl Checksum {
    pub fn compute(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    }

    /// Must run after the last field mutation.
    pub fn apply(buffer: &mut FrameBuffer) {
        for range in FRAMES.iter() {
            if let Some((last, body)) = buffer.0[range.clone()].split_last_mut() {
                *last = Checksum::compute(body);
            }
        }
    }

    pub fn verify(frame: &[u8]) -> bool {
        match frame.split_last() {
            Some((&sum, body)) => Checksum::compute(body) == sum,
            None => false,
        }
    }
}
