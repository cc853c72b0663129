use std::{
    sync::{
        atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, warn};

use crate::daikin::{Edge, Level, Phy};

/// Shortest window that still covers a full command.
pub const MIN_CAPTURE_WINDOW: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Capturing = 1,
    Decoding = 2,
}

impl CaptureState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CaptureState::Capturing,
            2 => CaptureState::Decoding,
            _ => CaptureState::Idle,
        }
    }
}

/// Outcome of a single edge, returned to the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    /// First edge of a capture, the caller must arm the window timer.
    WindowStarted,
    Recorded,
    /// The buffer is full, the edge was dropped.
    Overflow,
    /// A capture is being decoded, the edge was dropped.
    Ignored,
}

/// Interrupt-driven edge capture.
///
/// `on_edge` is the only writer to the edge buffer and its length, and never
/// allocates, locks or logs, so it can be called straight from a pin
/// interrupt. The window timer calls `close_window`, which stops the capture
/// before reading.
pub struct Receiver {
    state: AtomicU8,
    len: AtomicUsize,
    slots: Box<[AtomicU64]>,
    window: Duration,
    phy: Phy,
}

fn pack(edge: Edge) -> u64 {
    let level: u64 = match edge.level {
        Level::Low => 0,
        Level::High => 1,
    };
    (level << 32) | edge.timestamp as u64
}

fn unpack(raw: u64) -> Edge {
    Edge {
        level: if raw >> 32 & 1 == 0 {
            Level::Low
        } else {
            Level::High
        },
        timestamp: raw as u32,
    }
}

impl Receiver {
    pub fn new(capacity: usize, window: Duration) -> Self {
        if window < MIN_CAPTURE_WINDOW {
            warn!(?window, "capture window shorter than a full command");
        }

        Self {
            state: AtomicU8::new(CaptureState::Idle as u8),
            len: AtomicUsize::new(0),
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            window,
            phy: Phy::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records an edge. Safe to call from interrupt context.
    pub fn on_edge(&self, level: Level, timestamp: u32) -> EdgeEvent {
        let started = self
            .state
            .compare_exchange(
                CaptureState::Idle as u8,
                CaptureState::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if !started && self.state() != CaptureState::Capturing {
            return EdgeEvent::Ignored;
        }

        // A new capture overwrites the previous one
        let index = if started {
            0
        } else {
            self.len.load(Ordering::Relaxed)
        };
        let Some(slot) = self.slots.get(index) else {
            return EdgeEvent::Overflow;
        };
        slot.store(pack(Edge { level, timestamp }), Ordering::Relaxed);
        self.len.store(index + 1, Ordering::Release);

        if started {
            EdgeEvent::WindowStarted
        } else {
            EdgeEvent::Recorded
        }
    }

    /// Ends the current capture and decodes it. Returns `None` when no capture
    /// was running.
    pub fn close_window(&self) -> Option<Vec<Vec<u8>>> {
        self.state
            .compare_exchange(
                CaptureState::Capturing as u8,
                CaptureState::Decoding as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        let edges = self.take_edges();
        if edges.len() == self.slots.len() {
            warn!(capacity = self.slots.len(), "capture buffer full, later edges were dropped");
        }
        let frames = self.phy.decode_edges(&edges);
        debug!(edges = edges.len(), frames = frames.len(), "capture decoded");
        for (i, frame) in frames.iter().enumerate() {
            debug!(frame = i, bytes = %hex::encode(frame), "captured frame");
        }

        // Edges are ignored while decoding, nothing else writes the length now
        self.len.store(0, Ordering::Relaxed);
        self.state
            .store(CaptureState::Idle as u8, Ordering::Release);
        Some(frames)
    }

    fn take_edges(&self) -> Vec<Edge> {
        let len = self.len.load(Ordering::Acquire);
        self.slots[..len]
            .iter()
            .map(|slot| unpack(slot.load(Ordering::Relaxed)))
            .collect()
    }

    /// Spawns the window timer for a capture that just started and hands
    /// the decoded frames to `on_frames` once it expires.
    pub fn arm_window<F>(self: &Arc<Self>, on_frames: F) -> JoinHandle<()>
    where
        F: FnOnce(Vec<Vec<u8>>) + Send + 'static,
    {
        let receiver = self.clone();
        thread::spawn(move || {
            thread::sleep(receiver.window);
            if let Some(frames) = receiver.close_window() {
                on_frames(frames);
            }
        })
    }
}
