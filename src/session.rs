//! Client-held request snapshot and the single in-flight transition
use super::actor::Actor;
use super::dispatch::{ActionDispatcher, Command};
use super::error::{DispatchError, InvariantError, SessionError, ValidationError};
use super::gate::{Action, Gate, GateDecision};
use super::merge::{RequestPatch, merge};
use super::request::{Request, RequestId};
use super::status::Status;
use tracing::{info, warn};

/// Ticket for a transition that has been sent and not yet settled.
#[derive(Debug)]
#[must_use = "a pending action keeps the session busy until it is settled"]
pub struct PendingAction {
    action: Action,
    request_id: RequestId,
}

impl PendingAction {
    pub fn action(&self) -> Action {
        self.action
    }
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

/// Holds the latest snapshot of one request. The snapshot is only ever
/// replaced, either by merging a successful response or by a refresh.
#[derive(Debug)]
pub struct RequestSession {
    snapshot: Request,
    gate: Gate,
    in_flight: Option<Action>,
    last_error: Option<String>,
}

impl RequestSession {
    pub fn new(snapshot: Request) -> Self {
        Self::with_gate(snapshot, Gate::default())
    }

    pub fn with_gate(snapshot: Request, gate: Gate) -> Self {
        Self {
            snapshot,
            gate,
            in_flight: None,
            last_error: None,
        }
    }

    pub fn snapshot(&self) -> &Request {
        &self.snapshot
    }
    pub fn status(&self) -> Status {
        self.snapshot.status()
    }
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
    pub fn in_flight(&self) -> Option<Action> {
        self.in_flight
    }
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Gate decision for the current snapshot; nothing is permitted while a
    /// call is outstanding.
    pub fn decision(&self, actor: &Actor) -> Result<GateDecision, InvariantError> {
        let decision = self.gate.evaluate(actor, &self.snapshot)?;
        if self.is_busy() {
            return Ok(GateDecision::deny("an action is already in progress"));
        }
        Ok(decision)
    }

    /// Checks the command locally and marks it in flight.
    pub fn begin(&mut self, actor: &Actor, command: &Command) -> Result<PendingAction, SessionError> {
        if let Some(action) = self.in_flight {
            return Err(SessionError::Busy(action));
        }

        let action = command.action();
        let decision = self.gate.evaluate(actor, &self.snapshot)?;
        if !decision.permits(action) {
            let hint = decision
                .hint
                .unwrap_or_else(|| format!("{action} is not available to this actor"));
            return Err(ValidationError::NotPermitted { action, hint }.into());
        }
        command.validate(&self.snapshot)?;

        info!(request = %self.snapshot.id, actor = %actor.id, %action, "dispatching transition");
        self.in_flight = Some(action);

        Ok(PendingAction {
            action,
            request_id: self.snapshot.id.clone(),
        })
    }

    /// Folds the outcome of a pending call into the session. A failure
    /// leaves the snapshot exactly as it was, and a ticket this session did
    /// not issue is refused without touching anything.
    pub fn settle(
        &mut self,
        pending: PendingAction,
        result: Result<RequestPatch, DispatchError>,
    ) -> Result<&Request, SessionError> {
        if pending.request_id != self.snapshot.id || self.in_flight != Some(pending.action) {
            warn!(
                request = %self.snapshot.id,
                ticket = %pending.request_id,
                action = %pending.action,
                "refusing to settle a foreign ticket"
            );
            return Err(SessionError::ForeignTicket {
                action: pending.action,
                request_id: pending.request_id,
            });
        }
        self.in_flight = None;

        match result {
            Ok(patch) => {
                self.snapshot = merge(&self.snapshot, patch);
                self.last_error = None;
                info!(
                    request = %pending.request_id,
                    action = %pending.action,
                    state = %self.snapshot.raw_state,
                    status = %self.snapshot.status(),
                    "transition settled"
                );
                Ok(&self.snapshot)
            }
            Err(e) => {
                warn!(request = %pending.request_id, action = %pending.action, error = %e, "transition failed");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Runs begin, the dispatcher call and settle in one go.
    pub fn perform<D: ActionDispatcher + ?Sized>(
        &mut self,
        actor: &Actor,
        command: &Command,
        dispatcher: &D,
    ) -> Result<&Request, SessionError> {
        let pending = self.begin(actor, command)?;
        let result = command.dispatch(dispatcher, actor, &pending.request_id);
        self.settle(pending, result)
    }

    /// Replaces the snapshot with a freshly read record.
    pub fn refresh(&mut self, latest: Request) {
        self.snapshot = latest;
        self.last_error = None;
    }
}
