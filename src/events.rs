//! Gate lifecycle events.
//!
//! Every phase transition of a [`DeferredMountGate`](crate::gate::DeferredMountGate) is
//! published on a broadcast channel as a [`GateEvent`]. Hosts can subscribe to drive re-renders,
//! and tests use the sequence to check phase ordering.

use std::fmt::Display;
use uuid::Uuid;

/// A unique identifier for a gate, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(Uuid);

impl GateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GateId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for GateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted by a gate, in the order the phases happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// The gate saw its first committed frame
    FirstPaint { gate: GateId },
    /// The host was not available yet; observation is retried on the next frame
    ObservationDeferred { gate: GateId },
    /// The host is being watched for viewport proximity
    ObservationStarted { gate: GateId, margin_px: u32 },
    /// The host came within the margin
    ProximityTriggered { gate: GateId },
    /// Load has been handed to the idle scheduler
    IdleScheduled { gate: GateId, scheduler: &'static str },
    /// The idle callback fired and the subsystem is being loaded
    LoadStarted { gate: GateId },
    /// The subsystem was loaded and swapped in
    Mounted { gate: GateId, subsystem: String },
    /// The subsystem failed to load; the placeholder stays
    LoadFailed { gate: GateId, reason: String },
    /// The gate was torn down
    TornDown { gate: GateId },
}

impl GateEvent {
    pub fn gate(&self) -> GateId {
        match self {
            GateEvent::FirstPaint { gate }
            | GateEvent::ObservationDeferred { gate }
            | GateEvent::ObservationStarted { gate, .. }
            | GateEvent::ProximityTriggered { gate }
            | GateEvent::IdleScheduled { gate, .. }
            | GateEvent::LoadStarted { gate }
            | GateEvent::Mounted { gate, .. }
            | GateEvent::LoadFailed { gate, .. }
            | GateEvent::TornDown { gate } => *gate,
        }
    }

    /// Short name of the event kind, handy for asserting sequences.
    pub fn kind(&self) -> &'static str {
        match self {
            GateEvent::FirstPaint { .. } => "FirstPaint",
            GateEvent::ObservationDeferred { .. } => "ObservationDeferred",
            GateEvent::ObservationStarted { .. } => "ObservationStarted",
            GateEvent::ProximityTriggered { .. } => "ProximityTriggered",
            GateEvent::IdleScheduled { .. } => "IdleScheduled",
            GateEvent::LoadStarted { .. } => "LoadStarted",
            GateEvent::Mounted { .. } => "Mounted",
            GateEvent::LoadFailed { .. } => "LoadFailed",
            GateEvent::TornDown { .. } => "TornDown",
        }
    }
}
