use std::{convert::Infallible, io::Write, time::Duration};

use embedded_hal::{blocking::delay::DelayUs, PwmPin};
use thiserror::Error;

use crate::daikin::{Carrier, Pulse};
use crate::transmitter::Emitter;

use super::codecs::{create_codec, Codec, CodecType};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Drives a PWM channel wired to an IR LED. The channel must already be
/// configured for the carrier frequency, only the duty cycle is changed here.
pub struct PwmEmitter<P, D> {
    pin: P,
    delay: D,
    duty_on: u16,
}

impl<P, D> PwmEmitter<P, D>
where
    P: PwmPin<Duty = u16>,
    D: DelayUs<u32>,
{
    /// `duty` is the fraction of the period the LED is lit during a mark,
    /// it controls the emitted intensity.
    pub fn new(mut pin: P, delay: D, duty: f32) -> Self {
        let duty_on = (pin.get_max_duty() as f32 * duty.clamp(0.0, 1.0)).round() as u16;
        pin.set_duty(0);
        pin.enable();
        Self {
            pin,
            delay,
            duty_on,
        }
    }

    pub fn release(mut self) -> (P, D) {
        self.pin.set_duty(0);
        self.pin.disable();
        (self.pin, self.delay)
    }
}

impl<P, D> Emitter for PwmEmitter<P, D>
where
    P: PwmPin<Duty = u16>,
    D: DelayUs<u32>,
{
    type Error = Infallible;

    fn set_carrier(&mut self, carrier: Carrier) -> Result<(), Infallible> {
        self.pin.set_duty(match carrier {
            Carrier::On => self.duty_on,
            Carrier::Off => 0,
        });
        Ok(())
    }

    fn hold(&mut self, duration: Duration) -> Result<(), Infallible> {
        self.delay.delay_us(duration.as_micros() as u32);
        Ok(())
    }
}

/// Writes each transmission as one line of text instead of driving hardware.
pub struct Lines {
    codec: Box<dyn Codec + Send>,
    writer: Box<dyn Write + Send>,
    pending: Vec<Pulse>,
    carrier: Carrier,
}

impl Lines {
    pub fn new(codec_type: CodecType, writer: Box<dyn Write + Send>) -> Self {
        Self {
            codec: create_codec(codec_type),
            writer,
            pending: Vec::new(),
            carrier: Carrier::Off,
        }
    }
}

impl Emitter for Lines {
    type Error = DeviceError;

    fn set_carrier(&mut self, carrier: Carrier) -> Result<(), DeviceError> {
        self.carrier = carrier;
        Ok(())
    }

    fn hold(&mut self, duration: Duration) -> Result<(), DeviceError> {
        self.pending.push(Pulse {
            carrier: self.carrier,
            duration,
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        let pulses = std::mem::take(&mut self.pending);
        writeln!(self.writer, "{}", self.codec.encode(&pulses))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakePin {
        duty: Arc<Mutex<Vec<u16>>>,
        enabled: bool,
    }

    impl PwmPin for FakePin {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn get_duty(&self) -> u16 {
            *self.duty.lock().unwrap().last().unwrap_or(&0)
        }
        fn get_max_duty(&self) -> u16 {
            u16::MAX
        }
        fn set_duty(&mut self, duty: u16) {
            self.duty.lock().unwrap().push(duty);
        }
    }

    struct FakeDelay(u64);

    impl DelayUs<u32> for FakeDelay {
        fn delay_us(&mut self, us: u32) {
            self.0 += us as u64;
        }
    }

    #[test]
    fn test_pwm_emitter() {
        let duty = Arc::new(Mutex::new(Vec::new()));
        let pin = FakePin {
            duty: duty.clone(),
            enabled: false,
        };
        let mut emitter = PwmEmitter::new(pin, FakeDelay(0), 0.25);

        emitter.set_carrier(Carrier::On).unwrap();
        emitter.hold(Duration::from_micros(425)).unwrap();
        emitter.set_carrier(Carrier::Off).unwrap();
        emitter.hold(Duration::from_micros(1295)).unwrap();

        let (pin, delay) = emitter.release();
        assert!(!pin.enabled);
        assert_eq!(delay.0, 1720);
        assert_eq!(*duty.lock().unwrap(), vec![0, 16384, 0, 0]);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lines() {
        let out = SharedBuf::default();
        let mut lines = Lines::new(CodecType::Raw, Box::new(out.clone()));

        let pulses = [
            Pulse {
                carrier: Carrier::On,
                duration: Duration::from_micros(3490),
            },
            Pulse {
                carrier: Carrier::Off,
                duration: Duration::from_micros(1720),
            },
        ];
        crate::transmitter::emit(&mut lines, &pulses).unwrap();

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "+3490 -1720\n");
    }
}
