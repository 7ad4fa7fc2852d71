//! Inbound sequence-number tracking.
//!
//! Gap detection is observational only: a gap is reported and the tracker
//! moves on to the new number. Recovery (retransmission, recap request) is
//! up to the caller.

/// Missing range of sequence numbers, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqGap {
    pub begin: u64,
    pub end: u64,
}

impl SeqGap {
    /// Number of missing messages.
    #[must_use]
    pub fn missing(&self) -> u64 {
        self.end - self.begin + 1
    }
}

/// Outcome of observing one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    InOrder,
    /// Equal to or older than the last number seen.
    Duplicate,
    Gap(SeqGap),
}

/// Last-seen sequence number of one stream. Zero means "unknown" and never
/// produces a gap.
#[derive(Debug, Clone, Default)]
pub struct SeqTracker {
    last: Option<u64>,
}

impl SeqTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, seq: u64) -> SeqCheck {
        if seq == 0 {
            return SeqCheck::InOrder;
        }
        let check = match self.last {
            None => SeqCheck::InOrder,
            Some(last) if last.checked_add(1) == Some(seq) => SeqCheck::InOrder,
            Some(last) if seq <= last => return SeqCheck::Duplicate,
            Some(last) => SeqCheck::Gap(SeqGap {
                begin: last + 1,
                end: seq - 1,
            }),
        };
        self.last = Some(seq);
        check
    }

    #[must_use]
    pub fn last(&self) -> Option<u64> {
        self.last
    }

    /// Forget the stream position; the next number is accepted as is.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Resynchronise on a full-state message. Zero forgets the position.
    pub fn reset_to(&mut self, seq: u64) {
        self.last = (seq != 0).then_some(seq);
    }
}
