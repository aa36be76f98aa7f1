//! Block lifecycle events

use accrollup_core::Hash;

/// Capacity of the event channel; slow subscribers observe a lag error
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Emitted on the sequencer's broadcast channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockEvent {
    /// Block was submitted to the parent chain
    Submitted(Hash),
    /// Block was confirmed on the parent chain
    Confirmed(Hash),
}
