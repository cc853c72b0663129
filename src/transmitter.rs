use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::daikin::{Carrier, FrameBuffer, Phy, PhyError, Pulse};

/// An infrared output: a carrier that can be switched on and off and a way to
/// hold the current state for a precise amount of time.
pub trait Emitter {
    type Error: std::fmt::Display;

    fn set_carrier(&mut self, carrier: Carrier) -> Result<(), Self::Error>;
    fn hold(&mut self, duration: Duration) -> Result<(), Self::Error>;

    /// Called once the last pulse of a transmission has been held.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmitError {
    #[error("hardware fault: {0}")]
    HardwareFault(String),

    #[error("a transmission is already in progress")]
    Busy,

    #[error("gave up waiting for the transmission to complete")]
    Timeout,

    #[error("the transmitter worker has stopped")]
    Closed,

    #[error("failed to build pulse sequence: {0}")]
    Phy(#[from] PhyError),
}

/// Emits a complete pulse sequence, blocking until the last pulse elapsed.
///
/// On failure the carrier is switched off before returning so it can never be
/// left stuck on.
pub fn emit<E: Emitter>(emitter: &mut E, pulses: &[Pulse]) -> Result<(), TransmitError> {
    let result = pulses
        .iter()
        .try_for_each(|pulse| {
            emitter.set_carrier(pulse.carrier)?;
            emitter.hold(pulse.duration)
        })
        .and_then(|_| emitter.finish());

    result.map_err(|e| {
        if let Err(off) = emitter.set_carrier(Carrier::Off) {
            warn!(%off, "failed to switch carrier off after fault");
        }
        TransmitError::HardwareFault(e.to_string())
    })
}

struct Job {
    pulses: Vec<Pulse>,
    done: mpsc::Sender<Result<(), TransmitError>>,
}

/// Owns the emitter on a dedicated worker thread.
///
/// Only one transmission can be in flight, a second request while the worker
/// is busy is rejected rather than queued behind it. Once started a
/// transmission always runs to completion, even if the caller stops waiting.
pub struct Transmitter {
    phy: Phy,
    jobs: Option<SyncSender<Job>>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Transmitter {
    pub fn new<E>(emitter: E) -> Self
    where
        E: Emitter + Send + 'static,
    {
        let (jobs, queue) = mpsc::sync_channel::<Job>(1);
        let busy = Arc::new(AtomicBool::new(false));

        let worker = {
            let busy = busy.clone();
            thread::spawn(move || Transmitter::run(emitter, queue, busy))
        };

        Self {
            phy: Phy::new(),
            jobs: Some(jobs),
            busy,
            worker: Some(worker),
        }
    }

    fn run<E: Emitter>(mut emitter: E, queue: Receiver<Job>, busy: Arc<AtomicBool>) {
        while let Ok(job) = queue.recv() {
            info!(pulses = job.pulses.len(), "sending IR state to Daikin unit");
            let result = emit(&mut emitter, &job.pulses);
            if let Err(e) = &result {
                warn!(%e, "transmission failed");
            }
            busy.store(false, Ordering::Release);

            // The caller may have given up waiting
            let _ = job.done.send(result);
        }
        debug!("transmitter worker exiting");
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Sends `buffer` and blocks until it has been fully emitted.
    pub fn transmit(&self, buffer: &FrameBuffer) -> Result<(), TransmitError> {
        self.submit(buffer)?.recv().map_err(|_| TransmitError::Closed)?
    }

    /// Like [`Transmitter::transmit`] but stops waiting after `timeout`. The
    /// signal itself is never cut short.
    pub fn transmit_timeout(
        &self,
        buffer: &FrameBuffer,
        timeout: Duration,
    ) -> Result<(), TransmitError> {
        match self.submit(buffer)?.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TransmitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TransmitError::Closed),
        }
    }

    fn submit(
        &self,
        buffer: &FrameBuffer,
    ) -> Result<mpsc::Receiver<Result<(), TransmitError>>, TransmitError> {
        let jobs = self.jobs.as_ref().ok_or(TransmitError::Closed)?;
        let pulses = self.phy.encode(buffer)?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("rejecting transmission, emitter busy");
            return Err(TransmitError::Busy);
        }

        let (done, completion) = mpsc::channel();
        if jobs.send(Job { pulses, done }).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(TransmitError::Closed);
        }

        Ok(completion)
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish the current job and exit
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("transmitter worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daikin::{encode, ClimateCommand, EncodeError, Fan, Mode};
    use std::sync::{Condvar, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Carrier(Carrier),
        Hold(Duration),
    }

    /// Records every call, optionally failing after a number of holds and
    /// blocking on a gate before the first one.
    #[derive(Clone, Default)]
    struct RecordingEmitter {
        events: Arc<Mutex<Vec<Event>>>,
        fail_after: Option<usize>,
        gate: Option<Arc<(Mutex<bool>, Condvar)>>,
    }

    impl RecordingEmitter {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Emitter for RecordingEmitter {
        type Error = String;

        fn set_carrier(&mut self, carrier: Carrier) -> Result<(), String> {
            self.events.lock().unwrap().push(Event::Carrier(carrier));
            Ok(())
        }

        fn hold(&mut self, duration: Duration) -> Result<(), String> {
            if let Some(gate) = &self.gate {
                let (open, cvar) = &**gate;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
            }

            let mut events = self.events.lock().unwrap();
            let holds = events.iter().filter(|e| matches!(e, Event::Hold(_))).count();
            if self.fail_after == Some(holds) {
                return Err("pin stuck".into());
            }
            events.push(Event::Hold(duration));
            Ok(())
        }
    }

    fn buffer() -> FrameBuffer {
        encode(&ClimateCommand::new(true, Mode::Cool, 22, Fan::Auto)).unwrap()
    }

    #[test]
    fn test_transmit_emits_full_sequence() {
        let emitter = RecordingEmitter::default();
        let transmitter = Transmitter::new(emitter.clone());
        transmitter.transmit(&buffer()).unwrap();
        assert!(!transmitter.is_busy());

        let expected = Phy::new().encode(&buffer()).unwrap();
        let events = emitter.events();
        assert_eq!(events.len(), expected.len() * 2);
        for (pair, pulse) in events.chunks(2).zip(expected.iter()) {
            assert_eq!(
                pair,
                &[Event::Carrier(pulse.carrier), Event::Hold(pulse.duration)]
            );
        }
    }

    #[test]
    fn test_fault_leaves_carrier_off() {
        crate::init_tracing();
        let emitter = RecordingEmitter {
            fail_after: Some(20),
            ..Default::default()
        };
        let transmitter = Transmitter::new(emitter.clone());

        let err = transmitter.transmit(&buffer()).unwrap_err();
        assert_eq!(err, TransmitError::HardwareFault("pin stuck".into()));
        assert_eq!(
            emitter.events().last(),
            Some(&Event::Carrier(Carrier::Off))
        );

        // The worker is still usable afterwards
        assert!(!transmitter.is_busy());
    }

    #[test]
    fn test_busy_and_timeout() {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let emitter = RecordingEmitter {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let transmitter = Transmitter::new(emitter.clone());

        assert_eq!(
            transmitter.transmit_timeout(&buffer(), Duration::from_millis(20)),
            Err(TransmitError::Timeout)
        );
        assert!(transmitter.is_busy());
        assert_eq!(transmitter.transmit(&buffer()), Err(TransmitError::Busy));

        {
            let (open, cvar) = &*gate;
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }

        // Dropping joins the worker, which finishes the abandoned signal
        drop(transmitter);
        let holds = emitter
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Hold(_)))
            .count();
        assert_eq!(holds, Phy::pulse_count(&buffer()));
    }

    #[test]
    fn test_invalid_command_never_reaches_emitter() {
        let emitter = RecordingEmitter::default();
        let transmitter = Transmitter::new(emitter.clone());

        let result = ClimateCommand::parse("on", "cool", "22", "9").and_then(|c| encode(&c));
        assert_eq!(result, Err(EncodeError::InvalidFan));

        drop(transmitter);
        assert!(emitter.events().is_empty());
    }
}
