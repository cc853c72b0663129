use super::layout::{self, Checksum, FrameBuffer, LayoutError};
use super::{ClimateCommand, Clock, Fan, Mode, MAX_TEMP, MIN_TEMP};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Power value must be 0 or 1")]
    InvalidPower,

    #[error("Invalid mode, possible values: heat, cool, auto, dry, fan_only or off")]
    InvalidMode,

    #[error("Temperature must be between 10 and 32 (Celsius)")]
    InvalidTemperature,

    #[error("Invalid fan value, possible values: Auto, Quiet, 1, 2, 3, 4 or 5")]
    InvalidFan,

    #[error("Clock must be at most 23:59 with a day of week between 1 and 7")]
    InvalidClock,

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Checksum mismatch in frame {0}")]
    ChecksumMismatch(usize),

    #[error("Mode value wasn't recognized: {0:#05b}")]
    UnknownMode(u8),

    #[error("Fan value wasn't recognized: {0:#x}")]
    UnknownFan(u8),
}

// Modes
const MODE_AUTO: u32 = 0b000;
const MODE_DRY: u32 = 0b010;
const MODE_COOL: u32 = 0b011;
const MODE_HEAT: u32 = 0b100;
const MODE_FAN: u32 = 0b110;

// Fans
const FAN_AUTO: u32 = 0xA;
const FAN_QUIET: u32 = 0xB;
const FAN_1: u32 = 3;

const SWING_ON: u32 = 0b1111;
const SWING_OFF: u32 = 0b0000;

const MAX_MINUTES: u16 = 24 * 60 - 1;

fn mode_code(mode: Mode) -> u32 {
    match mode {
        Mode::Auto => MODE_AUTO,
        Mode::Dry => MODE_DRY,
        Mode::Cool => MODE_COOL,
        Mode::Heat => MODE_HEAT,
        // The unit is turned off through the power bit, mode stays on fan
        Mode::FanOnly | Mode::Off => MODE_FAN,
    }
}

fn fan_code(fan: Fan) -> u32 {
    match fan {
        Fan::Auto => FAN_AUTO,
        Fan::Quiet => FAN_QUIET,
        Fan::Speed1 => FAN_1,
        Fan::Speed2 => FAN_1 + 1,
        Fan::Speed3 => FAN_1 + 2,
        Fan::Speed4 => FAN_1 + 3,
        Fan::Speed5 => FAN_1 + 4,
    }
}

fn swing_code(on: bool) -> u32 {
    if on {
        SWING_ON
    } else {
        SWING_OFF
    }
}

/// Builds the checksummed frame buffer for `command`.
///
/// Always starts from a fresh copy of the default template, validates fields
/// in order (power, mode, temperature, fan) and never touches any hardware.
pub fn encode(command: &ClimateCommand) -> Result<FrameBuffer, EncodeError> {
    let mut buffer = FrameBuffer::default();

    let power = command.power && command.mode != Mode::Off;
    buffer
        .set(layout::POWER, power as u32)
        .map_err(|_| EncodeError::InvalidPower)?;

    buffer
        .set(layout::MODE, mode_code(command.mode))
        .map_err(|_| EncodeError::InvalidMode)?;

    if !(MIN_TEMP..=MAX_TEMP).contains(&command.temperature) {
        return Err(EncodeError::InvalidTemperature);
    }
    buffer
        .set(layout::TEMPERATURE, command.temperature as u32)
        .map_err(|_| EncodeError::InvalidTemperature)?;

    buffer
        .set(layout::FAN, fan_code(command.fan))
        .map_err(|_| EncodeError::InvalidFan)?;

    buffer.set(layout::SWING_V, swing_code(command.swing_vertical))?;
    buffer.set(layout::SWING_H, swing_code(command.swing_horizontal))?;
    buffer.set(layout::POWERFUL, command.powerful as u32)?;
    buffer.set(layout::QUIET, command.quiet as u32)?;
    buffer.set(layout::COMFORT, command.comfort as u32)?;
    buffer.set(layout::SENSOR, command.sensor as u32)?;
    buffer.set(layout::ECONO, command.econo as u32)?;

    if let Some(clock) = command.clock {
        if clock.minutes > MAX_MINUTES || !(1..=7).contains(&clock.day_of_week) {
            return Err(EncodeError::InvalidClock);
        }
        buffer.set(layout::TIME, clock.minutes as u32)?;
        buffer.set(layout::DAY_OF_WEEK, clock.day_of_week as u32)?;
    }

    Checksum::apply(&mut buffer);
    debug!(?buffer, "encoded climate command");

    Ok(buffer)
}

impl TryFrom<&ClimateCommand> for FrameBuffer {
    type Error = EncodeError;

    fn try_from(command: &ClimateCommand) -> Result<Self, EncodeError> {
        encode(command)
    }
}

impl TryFrom<&FrameBuffer> for ClimateCommand {
    type Error = EncodeError;

    fn try_from(buffer: &FrameBuffer) -> Result<Self, EncodeError> {
        if let Some(index) = buffer.frames().iter().position(|f| !Checksum::verify(f)) {
            return Err(EncodeError::ChecksumMismatch(index));
        }

        let mode = match buffer.get(layout::MODE) {
            MODE_AUTO => Mode::Auto,
            MODE_DRY => Mode::Dry,
            MODE_COOL => Mode::Cool,
            MODE_HEAT => Mode::Heat,
            MODE_FAN => Mode::FanOnly,
            other => return Err(EncodeError::UnknownMode(other as u8)),
        };

        let fan = match buffer.get(layout::FAN) {
            FAN_AUTO => Fan::Auto,
            FAN_QUIET => Fan::Quiet,
            3 => Fan::Speed1,
            4 => Fan::Speed2,
            5 => Fan::Speed3,
            6 => Fan::Speed4,
            7 => Fan::Speed5,
            other => return Err(EncodeError::UnknownFan(other as u8)),
        };

        Ok(ClimateCommand {
            power: buffer.get(layout::POWER) == 1,
            mode,
            temperature: buffer.get(layout::TEMPERATURE) as u8,
            fan,
            swing_vertical: buffer.get(layout::SWING_V) == SWING_ON,
            swing_horizontal: buffer.get(layout::SWING_H) == SWING_ON,
            powerful: buffer.get(layout::POWERFUL) == 1,
            quiet: buffer.get(layout::QUIET) == 1,
            comfort: buffer.get(layout::COMFORT) == 1,
            sensor: buffer.get(layout::SENSOR) == 1,
            econo: buffer.get(layout::ECONO) == 1,
            clock: Some(Clock {
                minutes: buffer.get(layout::TIME) as u16,
                day_of_week: buffer.get(layout::DAY_OF_WEEK) as u8,
            }),
        })
    }
}
