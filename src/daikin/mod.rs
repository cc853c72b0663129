pub mod layout;
pub use layout::{Checksum, Field, FrameBuffer, LayoutError};
pub mod packet;
pub use packet::{encode, EncodeError};
pub mod phy;
pub use phy::*;

use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString};

pub const MIN_TEMP: u8 = 10;
pub const MAX_TEMP: u8 = 32;

// The complete state sent to the unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClimateCommand {
    // Power state, forced off when mode is `Off`
    pub power: bool,

    pub mode: Mode,

    // Set temperature in Celsius
    pub temperature: u8,

    pub fan: Fan,

    pub swing_vertical: bool,
    pub swing_horizontal: bool,

    // Turbo mode, temporarily boosts cooling/heating
    pub powerful: bool,
    pub quiet: bool,
    pub comfort: bool,

    // Intelligent eye, the unit tracks presence in the room
    pub sensor: bool,
    pub econo: bool,

    // Clock shown on the unit, left untouched when None
    pub clock: Option<Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    // Minutes past midnight
    pub minutes: u16,
    // Sunday = 1, Saturday = 7
    pub day_of_week: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Mode {
    Auto,
    Dry,
    Cool,
    Heat,
    FanOnly,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Fan {
    #[strum(serialize = "Auto")]
    Auto,
    #[strum(serialize = "Quiet")]
    Quiet,
    #[strum(serialize = "1")]
    Speed1,
    #[strum(serialize = "2")]
    Speed2,
    #[strum(serialize = "3")]
    Speed3,
    #[strum(serialize = "4")]
    Speed4,
    #[strum(serialize = "5")]
    Speed5,
}

impl ClimateCommand {
    pub fn new(power: bool, mode: Mode, temperature: u8, fan: Fan) -> Self {
        Self {
            power,
            mode,
            temperature,
            fan,
            swing_vertical: false,
            swing_horizontal: false,
            powerful: false,
            quiet: false,
            comfort: false,
            sensor: false,
            econo: false,
            clock: None,
        }
    }

    /// Builds a command from the loosely typed values a control plane receives.
    ///
    /// Values are checked in order (power, mode, temperature, fan) and the
    /// first invalid one is reported.
    pub fn parse(power: &str, mode: &str, temperature: &str, fan: &str) -> Result<Self, EncodeError> {
        let power = parse_power(power).ok_or(EncodeError::InvalidPower)?;
        let mode = Mode::from_str(mode.trim()).map_err(|_| EncodeError::InvalidMode)?;
        let temperature = parse_temperature(temperature).ok_or(EncodeError::InvalidTemperature)?;
        let fan = Fan::from_str(fan.trim()).map_err(|_| EncodeError::InvalidFan)?;

        Ok(ClimateCommand::new(power, mode, temperature, fan))
    }
}

impl Default for ClimateCommand {
    fn default() -> Self {
        ClimateCommand::new(false, Mode::FanOnly, 25, Fan::Auto)
    }
}

fn parse_power(power: &str) -> Option<bool> {
    match power.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Some(true),
        "0" | "off" | "false" => Some(false),
        _ => None,
    }
}

// Accepts "21" as well as "21.0", fractional degrees are truncated
fn parse_temperature(temperature: &str) -> Option<u8> {
    let value = f64::from_str(temperature.trim()).ok()?.trunc();
    if !value.is_finite() || value < MIN_TEMP as f64 || value > MAX_TEMP as f64 {
        return None;
    }
    Some(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cmd = ClimateCommand::parse("on", "cool", "22", "3").unwrap();
        assert_eq!(cmd, ClimateCommand::new(true, Mode::Cool, 22, Fan::Speed3));

        let cmd = ClimateCommand::parse("0", "FAN_ONLY", "21.0", "Auto").unwrap();
        assert_eq!(cmd, ClimateCommand::new(false, Mode::FanOnly, 21, Fan::Auto));

        let cmd = ClimateCommand::parse("true", "off", "10", "quiet").unwrap();
        assert_eq!(cmd.fan, Fan::Quiet);
        assert_eq!(cmd.mode, Mode::Off);
    }

    #[test]
    fn test_parse_errors_in_order() {
        assert_eq!(
            ClimateCommand::parse("2", "bogus", "99", "9"),
            Err(EncodeError::InvalidPower)
        );
        assert_eq!(
            ClimateCommand::parse("on", "bogus", "99", "9"),
            Err(EncodeError::InvalidMode)
        );
        assert_eq!(
            ClimateCommand::parse("on", "heat", "warm", "9"),
            Err(EncodeError::InvalidTemperature)
        );
        assert_eq!(
            ClimateCommand::parse("on", "heat", "33", "auto"),
            Err(EncodeError::InvalidTemperature)
        );
        assert_eq!(
            ClimateCommand::parse("on", "heat", "9.9", "auto"),
            Err(EncodeError::InvalidTemperature)
        );
        assert_eq!(
            ClimateCommand::parse("on", "heat", "NaN", "auto"),
            Err(EncodeError::InvalidTemperature)
        );
        assert_eq!(
            ClimateCommand::parse("on", "heat", "20", "9"),
            Err(EncodeError::InvalidFan)
        );
    }

    #[test]
    fn test_default_matches_template() {
        let buffer = encode(&ClimateCommand::default()).unwrap();
        assert_eq!(buffer, FrameBuffer::default());
    }
}
