//! Human-facing status labels derived from the raw lifecycle state
use super::request::{RawState, RequestKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    AwaitingPayment,
    AwaitingSelection,
    Rejected,
    Approved,
    Active,
    Processed,
    Processing,
    Done,
    Paid,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::AwaitingPayment => "Awaiting Payment",
            Status::AwaitingSelection => "Awaiting Selection",
            Status::Rejected => "Rejected",
            Status::Approved => "Approved",
            Status::Active => "Active",
            Status::Processed => "Processed",
            Status::Processing => "Processing",
            Status::Done => "Done",
            Status::Paid => "Paid",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a raw state to its display status. The quote count only matters for a
/// purchase sitting at `DM_APPROVED`, where quotes on file mean a final
/// manager has something to choose from.
pub fn derive_status(raw_state: RawState, kind: RequestKind, quote_count: usize) -> Status {
    match (raw_state, kind) {
        (RawState::Draft | RawState::Submitted, _) => Status::Pending,
        (RawState::DmApproved, RequestKind::Purchase) if quote_count > 0 => {
            Status::AwaitingSelection
        }
        // projects never reach DM_APPROVED through the client
        (RawState::DmApproved, _) | (RawState::AcctApproved, _) => Status::AwaitingPayment,
        (RawState::DmRejected | RawState::AcctRejected | RawState::FinalRejected, _) => {
            Status::Rejected
        }
        (RawState::FinalApproved, RequestKind::Purchase) => Status::Approved,
        (RawState::FinalApproved, RequestKind::Project) => Status::Active,
        (RawState::FundsTransferred, _) => Status::Processed,
        (RawState::Processing, _) => Status::Processing,
        (RawState::Done, _) => Status::Done,
        (RawState::Paid, _) => Status::Paid,
    }
}
