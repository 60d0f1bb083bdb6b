//! The transition calls issued against the system of record
use super::actor::Actor;
use super::error::{DispatchError, ValidationError};
use super::gate::Action;
use super::ledger::{self, NewQuote, QuoteSelection};
use super::merge::RequestPatch;
use super::request::{Request, RequestId};

/// Remote collaborator that owns the authoritative record. Each call returns a
/// full or partial projection that callers fold in with [`crate::merge::merge`].
pub trait ActionDispatcher {
    fn submit(&self, actor: &Actor, request_id: &RequestId) -> Result<RequestPatch, DispatchError>;

    fn approve(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<RequestPatch, DispatchError>;

    fn reject(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        comment: &str,
    ) -> Result<RequestPatch, DispatchError>;

    fn add_quote(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        quote: &NewQuote,
    ) -> Result<RequestPatch, DispatchError>;

    fn select_quote(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        selection: QuoteSelection,
    ) -> Result<RequestPatch, DispatchError>;

    fn mark_project_done(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<RequestPatch, DispatchError>;

    fn confirm_client_paid(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        payout_reference: Option<&str>,
    ) -> Result<RequestPatch, DispatchError>;
}

/// A user-triggered transition together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SubmitDraft,
    Approve { comment: Option<String> },
    Reject { reason: String },
    AddQuote(NewQuote),
    SelectQuote(QuoteSelection),
    MarkDone,
    ConfirmPaid { payout_reference: Option<String> },
}

impl Command {
    pub fn action(&self) -> Action {
        match self {
            Command::SubmitDraft => Action::SubmitDraft,
            Command::Approve { .. } => Action::Approve,
            Command::Reject { .. } => Action::Reject,
            Command::AddQuote(_) => Action::AddQuote,
            Command::SelectQuote(_) => Action::SelectQuote,
            Command::MarkDone => Action::MarkDone,
            Command::ConfirmPaid { .. } => Action::ConfirmPaid,
        }
    }

    /// Payload preconditions checked before anything is sent.
    pub fn validate(&self, request: &Request) -> Result<(), ValidationError> {
        match self {
            Command::Reject { reason } if reason.trim().is_empty() => {
                Err(ValidationError::EmptyRejectionReason)
            }
            Command::AddQuote(quote) => quote.validate(),
            Command::SelectQuote(selection) => ledger::validate_selection(request, selection),
            _ => Ok(()),
        }
    }

    pub fn dispatch<D: ActionDispatcher + ?Sized>(
        &self,
        dispatcher: &D,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<RequestPatch, DispatchError> {
        match self {
            Command::SubmitDraft => dispatcher.submit(actor, request_id),
            Command::Approve { comment } => dispatcher.approve(actor, request_id, comment.as_deref()),
            Command::Reject { reason } => dispatcher.reject(actor, request_id, reason),
            Command::AddQuote(quote) => dispatcher.add_quote(actor, request_id, quote),
            Command::SelectQuote(selection) => dispatcher.select_quote(actor, request_id, *selection),
            Command::MarkDone => dispatcher.mark_project_done(actor, request_id),
            Command::ConfirmPaid { payout_reference } => {
                dispatcher.confirm_client_paid(actor, request_id, payout_reference.as_deref())
            }
        }
    }
}
