//! Request sequencing for "last issued wins" response handling.
//!
//! Every load tags itself with a sequence number; a response is applied only
//! if no newer request has been issued since, so a slow response to an older
//! page or ticket can never overwrite newer state.

/// Monotonic tag attached to an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(u64);

impl RequestSeq {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestSeq {
        self.latest += 1;
        RequestSeq(self.latest)
    }

    /// `true` when `seq` is the most recently issued tag.
    pub fn is_latest(&self, seq: RequestSeq) -> bool {
        seq.0 == self.latest
    }
}
