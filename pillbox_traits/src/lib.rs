pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::time::{Duration, Instant};

/// A scale advertised during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleCandidate {
    pub name: String,
    pub address: String,
}

/// Events delivered by the bottle scale collaborator, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// A net weight reading in grams.
    Weight { grams: f32, at: Instant },
    Connected { at: Instant },
    Disconnected { at: Instant },
    ScanFinished { candidates: Vec<ScaleCandidate> },
}

impl SensorEvent {
    /// Arrival time, when the event carries one.
    pub fn at(&self) -> Option<Instant> {
        match self {
            Self::Weight { at, .. } | Self::Connected { at } | Self::Disconnected { at } => {
                Some(*at)
            }
            Self::ScanFinished { .. } => None,
        }
    }
}

/// Fire-and-forget commands sent to the scale.
pub trait ScaleLink {
    /// Ask the scale to zero itself on the current load. No acknowledgement
    /// is modeled; success shows up as later samples approaching zero.
    fn tare(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A stream of scale events.
pub trait SensorSource {
    /// Block for up to `timeout` waiting for the next event.
    ///
    /// `Ok(None)` means no event arrived within the timeout; `Err` is a
    /// transport failure. A source that has ended for good keeps returning
    /// `Ok(None)` and reports `is_finished() == true`.
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<SensorEvent>, Box<dyn std::error::Error + Send + Sync>>;

    fn is_finished(&self) -> bool {
        false
    }

    /// Timestamp of the next event, for sources that know it before emitting.
    fn next_at(&self) -> Option<Instant> {
        None
    }
}
