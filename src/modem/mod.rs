/*

Text and hardware endpoints for the Daikin codec
------------------------------------------------

Pulse sequence -> Emitter (PWM pin, text lines)

Capture text (raw timings, edge log) -> Capture -> Phy -> frames

*/

pub mod codecs;
pub use codecs::{create_codec, Capture, Codec, CodecError, CodecType};

pub mod devices;
pub use devices::{DeviceError, Lines, PwmEmitter};
