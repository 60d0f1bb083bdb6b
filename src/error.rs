use super::gate::Action;
use super::request::{QuoteId, RawState, RequestId};
use std::path::PathBuf;

/// Local precondition failures. These are raised before any call leaves the
/// process and map to disabled controls in a UI.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A rejection reason is required")]
    EmptyRejectionReason,
    #[error("A quote needs a vendor name")]
    EmptyVendorName,
    #[error("A quote needs an attached file")]
    EmptyFileUrl,
    #[error("No quotes have been added yet")]
    NoQuotes,
    #[error("Quote {0} does not exist on this request")]
    QuoteNotFound(QuoteId),
    #[error("Quotes can only be managed on a purchase awaiting selection")]
    QuotesClosed,
    #[error("{action} is not available: {hint}")]
    NotPermitted { action: Action, hint: String },
    #[error("Project end time is before its start time")]
    InvalidSchedule,
    #[error("Request is missing {0}")]
    MissingField(&'static str),
    #[error("Item `{0}` must have a name and a non-zero quantity")]
    InvalidItem(String),
    #[error("Purchase requests need at least one item")]
    NoItems,
    #[error("Project details are only valid on project requests")]
    UnexpectedProjectDetails,
    #[error("Unknown lifecycle state `{0}`")]
    UnknownState(String),
}

/// Invariant violations on a snapshot. These are never repaired silently.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("Request {request_id} selects quote {quote_id}, which is not in its quote list")]
    DanglingSelectedQuote {
        request_id: RequestId,
        quote_id: QuoteId,
    },
}

/// Failures reported by the system of record or the transport to it.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("{action} refused while request is {state}: {hint}")]
    Conflict {
        action: Action,
        state: RawState,
        hint: String,
    },
    #[error("Cannot move request from {from} to {to}")]
    InvalidTransition { from: RawState, to: RawState },
    #[error("Request {0} was not found")]
    NotFound(RequestId),
    #[error("Transition refused: {0}")]
    Refused(#[from] ValidationError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("{0} is still in flight")]
    Busy(Action),
    #[error("{action} on request {request_id} was not started by this session")]
    ForeignTicket {
        action: Action,
        request_id: RequestId,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
