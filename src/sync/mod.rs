//! Cross-view consistency: request sequencing, read-state batching and the
//! fallback poller.

pub mod poller;
pub mod read_state;
pub mod sequence;

pub use poller::{FallbackPoller, PollTarget, PollerHandle};
pub use read_state::{ReadMarkOutcome, ReadStateSynchronizer};
pub use sequence::{RequestSeq, RequestSequencer};
