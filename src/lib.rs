pub mod config;
pub mod daikin;
pub mod modem;
pub mod pwm;
pub mod receiver;
pub mod transmitter;

pub use config::Config;
pub use daikin::{encode, ClimateCommand, EncodeError, Fan, FrameBuffer, Mode, Phy};
pub use receiver::Receiver;
pub use transmitter::{Emitter, TransmitError, Transmitter};

#[cfg(test)]
pub(crate) fn init_tracing() {
    use std::sync::Once;

    static INIT_TRACING: Once = Once::new();
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}
