//! Embedded system of record for requests
//!
//! Implements [`ActionDispatcher`] on top of sled. Every transition is
//! re-validated with the same gate the client uses, and answered with the
//! trimmed projections a remote backend would return.
use super::actor::Actor;
use super::config::EngineConfig;
use super::context::{RequestContext, Witness, WitnessType};
use super::dispatch::ActionDispatcher;
use super::error::{DispatchError, ValidationError};
use super::gate::{Action, Gate};
use super::ledger::{self, NewQuote, QuoteSelection};
use super::merge::RequestPatch;
use super::request::{RawState, Request, RequestDetails, RequestId, RequestKind};
use super::utils;
use sled::transaction::{TransactionError, abort};
use sled::{Batch, IVec};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RecordStore {
    instance: Arc<sled::Db>,
    gate: Gate,
    id_prefix: String,
}

fn request_key(id: &RequestId) -> String {
    format!("request/{id}")
}

fn context_key(id: &RequestId) -> String {
    format!("context/{id}")
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, DispatchError> {
    minicbor::to_vec(value).map_err(|e| DispatchError::Encode(e.to_string()))
}

// Moves the request along the edge `action` defines from its current state.
fn advance(current: &Request, action: Action) -> Result<Request, DispatchError> {
    let to = action
        .target_state(current.kind, current.raw_state)
        .ok_or_else(|| DispatchError::Conflict {
            action,
            state: current.raw_state,
            hint: format!("{action} has no transition from {}", current.raw_state),
        })?;

    let mut next = current.clone();
    next.raw_state = to;
    Ok(next)
}

impl RecordStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_config(instance, &EngineConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: &EngineConfig) -> Self {
        Self {
            instance,
            gate: Gate::new(config.gate.clone()),
            id_prefix: config.store.id_prefix.clone(),
        }
    }

    /// Opens the database at the configured path.
    pub fn open(config: &EngineConfig) -> Result<Self, DispatchError> {
        let db = sled::open(&config.store.path)?;
        Ok(Self::with_config(Arc::new(db), config))
    }

    fn load_raw(&self, request_id: &RequestId) -> Result<(IVec, Request), DispatchError> {
        let bytes = self
            .instance
            .get(request_key(request_id).as_bytes())?
            .ok_or_else(|| DispatchError::NotFound(request_id.clone()))?;
        let request = minicbor::decode(&bytes)?;
        Ok((bytes, request))
    }

    /// Load a request from the database
    pub fn load(&self, request_id: &RequestId) -> Result<Request, DispatchError> {
        self.load_raw(request_id).map(|(_, request)| request)
    }

    /// Load the transition history of a request
    pub fn history(&self, request_id: &RequestId) -> Result<RequestContext, DispatchError> {
        match self.instance.get(context_key(request_id).as_bytes())? {
            Some(bytes) => Ok(minicbor::decode(&bytes)?),
            None => Err(DispatchError::NotFound(request_id.clone())),
        }
    }

    /// Create a new draft request
    pub fn create_request(
        &self,
        actor: &Actor,
        details: RequestDetails,
    ) -> Result<Request, DispatchError> {
        let id = utils::new_request_id(&self.id_prefix)
            .map_err(|e| DispatchError::Identifier(e.to_string()))?;
        let request = details.finalise(id)?;

        let mut context = RequestContext::new(request.id.to_string());
        context.insert_witness(Witness::new(
            request.id.to_string(),
            actor,
            WitnessType::Create,
        ))?;

        // Batch insert: request and its context
        let mut batch = Batch::default();
        batch.insert(request_key(&request.id).as_bytes(), encode(&request)?);
        batch.insert(context_key(&request.id).as_bytes(), encode(&context)?);
        self.instance.apply_batch(batch)?;

        info!(request = %request.id, actor = %actor.id, kind = ?request.kind, "request created");
        Ok(request)
    }

    /// Writes the next record and its context, provided the stored record is
    /// still the one the change was computed from. Returns false on a lost race.
    fn commit(
        &self,
        previous: &IVec,
        next: &Request,
        context: &RequestContext,
    ) -> Result<bool, DispatchError> {
        let key = request_key(&next.id);
        let ctx_key = context_key(&next.id);
        let request_bytes = encode(next)?;
        let context_bytes = encode(context)?;

        let result = self.instance.transaction(|tx| {
            if tx.get(key.as_bytes())?.as_ref() != Some(previous) {
                return abort(());
            }
            tx.insert(key.as_bytes(), request_bytes.as_slice())?;
            tx.insert(ctx_key.as_bytes(), context_bytes.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(true),
            Err(TransactionError::Abort(())) => Ok(false),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn authorise(&self, actor: &Actor, request: &Request, action: Action) -> Result<(), DispatchError> {
        let decision = self.gate.evaluate(actor, request)?;
        if decision.permits(action) {
            return Ok(());
        }

        let hint = decision
            .hint
            .unwrap_or_else(|| format!("{action} is not available to {}", actor.role));
        warn!(request = %request.id, actor = %actor.id, %action, state = %request.raw_state, %hint, "transition refused");
        Err(DispatchError::Conflict {
            action,
            state: request.raw_state,
            hint,
        })
    }

    /// Loads, authorises, applies and persists one gated transition.
    fn transition<F>(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        action: Action,
        apply: F,
    ) -> Result<RequestPatch, DispatchError>
    where
        F: FnOnce(&Request) -> Result<(Request, WitnessType, RequestPatch), DispatchError>,
    {
        let (raw, current) = self.load_raw(request_id)?;
        self.authorise(actor, &current, action)?;

        let (next, witness_type, patch) = apply(&current)?;

        let mut context = self.history(request_id)?;
        context.insert_witness(Witness::new(request_id.to_string(), actor, witness_type))?;

        if !self.commit(&raw, &next, &context)? {
            warn!(request = %request_id, %action, "request changed while the transition was applied");
            return Err(DispatchError::Conflict {
                action,
                state: current.raw_state,
                hint: "request was changed by someone else; refresh and retry".to_string(),
            });
        }

        info!(
            request = %request_id,
            actor = %actor.id,
            %action,
            from = %current.raw_state,
            to = %next.raw_state,
            "transition accepted"
        );
        Ok(patch)
    }

    /// Back-office step outside the gated actions. The caller is recorded in
    /// the history but not checked against the gate.
    fn side_channel(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        from: RawState,
        to: RawState,
        witness_type: WitnessType,
    ) -> Result<Request, DispatchError> {
        let (raw, current) = self.load_raw(request_id)?;
        if current.kind != RequestKind::Project || current.raw_state != from {
            return Err(DispatchError::InvalidTransition {
                from: current.raw_state,
                to,
            });
        }

        let mut next = current.clone();
        next.raw_state = to;

        let mut context = self.history(request_id)?;
        context.insert_witness(Witness::new(request_id.to_string(), actor, witness_type))?;

        if !self.commit(&raw, &next, &context)? {
            return Err(DispatchError::InvalidTransition {
                from: current.raw_state,
                to,
            });
        }

        info!(request = %request_id, actor = %actor.id, from = %from, to = %to, "back-office transition");
        Ok(next)
    }

    /// An active project has been funded.
    pub fn record_funds_transferred(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<Request, DispatchError> {
        self.side_channel(
            actor,
            request_id,
            RawState::FinalApproved,
            RawState::FundsTransferred,
            WitnessType::FundsTransferred,
        )
    }

    /// Work on a funded project has started.
    pub fn start_processing(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<Request, DispatchError> {
        self.side_channel(
            actor,
            request_id,
            RawState::FundsTransferred,
            RawState::Processing,
            WitnessType::StartProcessing,
        )
    }
}

impl ActionDispatcher for RecordStore {
    fn submit(&self, actor: &Actor, request_id: &RequestId) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::SubmitDraft, |current| {
            let next = advance(current, Action::SubmitDraft)?;
            Ok((next.clone(), WitnessType::Submit, RequestPatch::from(next)))
        })
    }

    fn approve(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::Approve, |current| {
            let next = advance(current, Action::Approve)?;
            let witness = WitnessType::Approve {
                to: next.raw_state,
                comment: comment.map(str::to_string),
            };
            let patch = RequestPatch::state(next.raw_state);
            Ok((next, witness, patch))
        })
    }

    fn reject(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        comment: &str,
    ) -> Result<RequestPatch, DispatchError> {
        if comment.trim().is_empty() {
            return Err(ValidationError::EmptyRejectionReason.into());
        }
        self.transition(actor, request_id, Action::Reject, |current| {
            let mut next = advance(current, Action::Reject)?;
            next.rejection_reason = Some(comment.to_string());
            let witness = WitnessType::Reject {
                to: next.raw_state,
                reason: comment.to_string(),
            };
            let patch = RequestPatch::state(next.raw_state).with_rejection_reason(comment);
            Ok((next, witness, patch))
        })
    }

    fn add_quote(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        quote: &NewQuote,
    ) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::AddQuote, |current| {
            let next = ledger::append_quote(current, quote.clone())?;
            let quote_id = ledger::next_quote_id(&current.quotes);
            let patch = RequestPatch::new().with_quotes(next.quotes.clone());
            Ok((next, WitnessType::AddQuote { quote_id }, patch))
        })
    }

    fn select_quote(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        selection: QuoteSelection,
    ) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::SelectQuote, |current| {
            let quote_id = ledger::resolve_selection(current, &selection)?;
            let mut next = current.clone();
            next.selected_quote_id = Some(quote_id);
            let witness = WitnessType::SelectQuote {
                quote_id,
                auto_lowest: selection == QuoteSelection::AutoLowest,
            };
            Ok((next, witness, RequestPatch::new().with_selected_quote(quote_id)))
        })
    }

    fn mark_project_done(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::MarkDone, |current| {
            let next = advance(current, Action::MarkDone)?;
            let patch = RequestPatch::state(next.raw_state);
            Ok((next, WitnessType::MarkDone, patch))
        })
    }

    fn confirm_client_paid(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        payout_reference: Option<&str>,
    ) -> Result<RequestPatch, DispatchError> {
        self.transition(actor, request_id, Action::ConfirmPaid, |current| {
            let next = advance(current, Action::ConfirmPaid)?;
            let witness = WitnessType::ConfirmPaid {
                payout_reference: payout_reference.map(str::to_string),
            };
            let patch = RequestPatch::state(next.raw_state);
            Ok((next, witness, patch))
        })
    }
}
