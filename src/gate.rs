//! Permitted actions for an (actor, request) pair
//!
//! The gate is advisory. It drives which controls a client enables, and the
//! record store runs the same evaluation again before accepting a transition.
use super::actor::{Actor, EffectiveRole, Role, resolve_effective_role};
use super::config::GatePolicy;
use super::error::InvariantError;
use super::ledger;
use super::request::{RawState, Request, RequestKind};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    SubmitDraft,
    Approve,
    Reject,
    AddQuote,
    SelectQuote,
    MarkDone,
    ConfirmPaid,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::SubmitDraft,
        Action::Approve,
        Action::Reject,
        Action::AddQuote,
        Action::SelectQuote,
        Action::MarkDone,
        Action::ConfirmPaid,
    ];

    /// State the transition moves a request into. Quote actions leave the
    /// state alone and yield `None`, as does any action outside its flow.
    pub fn target_state(&self, kind: RequestKind, from: RawState) -> Option<RawState> {
        match (self, kind, from) {
            (Action::SubmitDraft, _, RawState::Draft) => Some(RawState::Submitted),
            (Action::Approve, RequestKind::Purchase, RawState::Submitted) => {
                Some(RawState::DmApproved)
            }
            (Action::Approve, RequestKind::Purchase, RawState::DmApproved)
            | (Action::Approve, RequestKind::Project, RawState::Submitted) => {
                Some(RawState::FinalApproved)
            }
            (Action::Reject, RequestKind::Purchase, RawState::Submitted) => {
                Some(RawState::DmRejected)
            }
            (Action::Reject, RequestKind::Project, RawState::Submitted) => {
                Some(RawState::FinalRejected)
            }
            (Action::MarkDone, RequestKind::Project, RawState::Processing) => Some(RawState::Done),
            (Action::ConfirmPaid, RequestKind::Project, RawState::Done) => Some(RawState::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::SubmitDraft => "submitDraft",
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::AddQuote => "addQuote",
            Action::SelectQuote => "selectQuote",
            Action::MarkDone => "markDone",
            Action::ConfirmPaid => "confirmPaid",
        };
        f.write_str(name)
    }
}

/// Outcome of a gate evaluation. `hint` is set exactly when nothing is permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub permitted: BTreeSet<Action>,
    pub hint: Option<String>,
}

impl GateDecision {
    pub fn allow(permitted: BTreeSet<Action>) -> Self {
        Self {
            permitted,
            hint: None,
        }
    }
    pub fn deny(hint: impl Into<String>) -> Self {
        Self {
            permitted: BTreeSet::new(),
            hint: Some(hint.into()),
        }
    }
    pub fn permits(&self, action: Action) -> bool {
        self.permitted.contains(&action)
    }
    pub fn is_empty(&self) -> bool {
        self.permitted.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gate {
    policy: GatePolicy,
}

impl Gate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn evaluate(&self, actor: &Actor, request: &Request) -> Result<GateDecision, InvariantError> {
        if let Err(violation) = ledger::check_selection(request) {
            error!(request = %request.id, %violation, "refusing to gate request");
            return Err(violation);
        }

        let effective = resolve_effective_role(actor.role, request.kind, &self.policy);
        let permitted = permitted_actions(effective.role(), actor, request);

        debug!(
            request = %request.id,
            actor = %actor.id,
            role = %effective.role(),
            assumed = effective.is_assumed(),
            state = %request.raw_state,
            ?permitted,
            "gate evaluated"
        );

        if permitted.is_empty() {
            Ok(GateDecision::deny(hint(&effective, request)))
        } else {
            Ok(GateDecision::allow(permitted))
        }
    }
}

/// Evaluates with the default policy, which assumes an unspecified manager's
/// sub-role from the request kind.
pub fn gate(actor: &Actor, request: &Request) -> Result<GateDecision, InvariantError> {
    Gate::default().evaluate(actor, request)
}

fn permitted_actions(role: Role, actor: &Actor, request: &Request) -> BTreeSet<Action> {
    let mut actions = BTreeSet::new();

    match (role, request.kind, request.raw_state) {
        (Role::Requester | Role::DirectManager, _, RawState::Draft) => {
            actions.insert(Action::SubmitDraft);
        }
        (Role::DirectManager, RequestKind::Purchase, RawState::Submitted)
        | (Role::FinalManager, RequestKind::Project, RawState::Submitted) => {
            actions.insert(Action::Approve);
            actions.insert(Action::Reject);
        }
        (Role::Accountant, RequestKind::Purchase, RawState::DmApproved) => {
            actions.insert(Action::AddQuote);
        }
        (Role::FinalManager, RequestKind::Purchase, RawState::DmApproved) => {
            if !request.quotes.is_empty() {
                actions.insert(Action::SelectQuote);
            }
            // approval is absent, not just disabled, until a quote is chosen
            if request.selected_quote_id.is_some() {
                actions.insert(Action::Approve);
            }
        }
        (Role::Requester, RequestKind::Project, RawState::Processing)
            if actor.id == request.requester_id =>
        {
            actions.insert(Action::MarkDone);
        }
        (Role::Accountant, RequestKind::Project, RawState::Done) => {
            actions.insert(Action::ConfirmPaid);
        }
        _ => {}
    }

    actions
}

fn hint(effective: &EffectiveRole, request: &Request) -> String {
    if *effective == EffectiveRole::Declared(Role::Manager) {
        return "manager sub-role is unknown and role inference is disabled".to_string();
    }
    let role = effective.role();

    let hint = match (request.kind, request.raw_state) {
        (_, RawState::Draft) => "waiting for the requester to submit the draft",
        (RequestKind::Purchase, RawState::Submitted) if role == Role::Accountant => {
            "waiting for Direct Manager approval before quotes can be added"
        }
        (RequestKind::Purchase, RawState::Submitted) => "waiting for Direct Manager approval",
        (RequestKind::Project, RawState::Submitted) => "waiting for Final Manager approval",
        (RequestKind::Purchase, RawState::DmApproved) if request.quotes.is_empty() => {
            "waiting for Accountant to add quotes"
        }
        (RequestKind::Purchase, RawState::DmApproved) if request.selected_quote_id.is_none() => {
            "waiting for Final Manager to select a quote"
        }
        (RequestKind::Purchase, RawState::DmApproved) => {
            "waiting for Final Manager to approve the selected quote"
        }
        (RequestKind::Project, RawState::DmApproved) => {
            "project requests are not approved by a Direct Manager; nothing to do"
        }
        (_, RawState::AcctApproved) => {
            "accountant approval is recorded; waiting for the system of record to advance the request"
        }
        (_, RawState::DmRejected | RawState::AcctRejected | RawState::FinalRejected) => {
            return match &request.rejection_reason {
                Some(reason) => format!("request was rejected: {reason}"),
                None => "request was rejected".to_string(),
            };
        }
        (RequestKind::Purchase, RawState::FinalApproved) => {
            "request is approved; no further action is required"
        }
        (RequestKind::Project, RawState::FinalApproved) => {
            "project is active; waiting for funds to be transferred"
        }
        (RequestKind::Purchase, RawState::FundsTransferred) => {
            "funds have been transferred; request is processed"
        }
        (RequestKind::Project, RawState::FundsTransferred) => {
            "funds transferred; waiting for the project to start processing"
        }
        (RequestKind::Project, RawState::Processing) if role == Role::Requester => {
            "only the original requester can mark this project done"
        }
        (RequestKind::Project, RawState::Processing) => {
            "waiting for the requester to mark the project done"
        }
        (RequestKind::Project, RawState::Done) => {
            "waiting for Accountant to confirm client payment"
        }
        (RequestKind::Purchase, RawState::Processing | RawState::Done) => {
            "purchase requests have no client actions in this state"
        }
        (_, RawState::Paid) => "request is paid; workflow complete",
    };

    hint.to_string()
}
