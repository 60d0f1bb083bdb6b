//! Folding partial transition responses into a held request snapshot
//!
//! Several transition endpoints answer with a trimmed projection of the
//! record, often just the new state and a rejection reason. Child collections
//! missing from such a projection are kept from the previous snapshot.
use super::actor::ActorId;
use super::request::{self, Item, ProjectDetails, Quote, QuoteId, RawState, Request};
use tracing::warn;

/// A full or partial projection of a request. `None` means the field was not
/// part of the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPatch {
    pub raw_state: Option<RawState>,
    pub requester_id: Option<ActorId>,
    pub direct_manager_id: Option<ActorId>,
    pub items: Option<Vec<Item>>,
    pub total_estimated_cost: Option<u64>,
    pub quotes: Option<Vec<Quote>>,
    pub selected_quote_id: Option<QuoteId>,
    pub rejection_reason: Option<String>,
    pub project: Option<ProjectDetails>,
}

impl RequestPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn state(raw_state: RawState) -> Self {
        Self {
            raw_state: Some(raw_state),
            ..Self::default()
        }
    }
    pub fn with_rejection_reason(mut self, reason: &str) -> Self {
        self.rejection_reason = Some(reason.to_string());
        self
    }
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.total_estimated_cost = Some(request::total_of(&items));
        self.items = Some(items);
        self
    }
    pub fn with_quotes(mut self, quotes: Vec<Quote>) -> Self {
        self.quotes = Some(quotes);
        self
    }
    pub fn with_selected_quote(mut self, id: QuoteId) -> Self {
        self.selected_quote_id = Some(id);
        self
    }
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<Request> for RequestPatch {
    fn from(value: Request) -> Self {
        Self {
            raw_state: Some(value.raw_state),
            requester_id: Some(value.requester_id),
            direct_manager_id: value.direct_manager_id,
            items: Some(value.items),
            total_estimated_cost: Some(value.total_estimated_cost),
            quotes: Some(value.quotes),
            selected_quote_id: value.selected_quote_id,
            rejection_reason: value.rejection_reason,
            project: value.project,
        }
    }
}

/// Returns `previous` with every field the patch defines written over it.
///
/// Absent or empty `items` keep the previous items and total, and absent or
/// empty `quotes` keep the previous quotes. Replaced items always carry a
/// total recomputed from the new list. Id and kind never change.
pub fn merge(previous: &Request, patch: RequestPatch) -> Request {
    let RequestPatch {
        raw_state,
        requester_id,
        direct_manager_id,
        items,
        total_estimated_cost,
        quotes,
        selected_quote_id,
        rejection_reason,
        project,
    } = patch;

    let mut next = previous.clone();

    if let Some(raw_state) = raw_state {
        next.raw_state = raw_state;
    }
    if let Some(requester_id) = requester_id {
        next.requester_id = requester_id;
    }
    if direct_manager_id.is_some() {
        next.direct_manager_id = direct_manager_id;
    }
    if let Some(items) = items.filter(|items| !items.is_empty()) {
        let total = request::total_of(&items);
        if total_estimated_cost.is_some_and(|reported| reported != total) {
            warn!(
                request = %previous.id,
                reported = ?total_estimated_cost,
                total,
                "response total disagrees with its items; using the recomputed total"
            );
        }
        next.items = items;
        next.total_estimated_cost = total;
    }
    if let Some(quotes) = quotes.filter(|quotes| !quotes.is_empty()) {
        next.quotes = quotes;
    }
    if selected_quote_id.is_some() {
        next.selected_quote_id = selected_quote_id;
    }
    if rejection_reason.is_some() {
        next.rejection_reason = rejection_reason;
    }
    if project.is_some() {
        next.project = project;
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestDetails, RequestId, RequestKind};

    fn purchase() -> Request {
        RequestDetails::new()
            .set_kind(RequestKind::Purchase)
            .set_requester(ActorId(1))
            .add_item("Chair", 2, 100)
            .add_item("Lamp", 1, 100)
            .finalise(RequestId::from("req_merge"))
            .unwrap()
    }

    #[test]
    fn trimmed_projection_keeps_items() {
        let previous = purchase();
        let patch = RequestPatch {
            items: Some(vec![]),
            total_estimated_cost: Some(0),
            ..RequestPatch::state(RawState::DmRejected)
        };

        let merged = merge(&previous, patch);

        assert_eq!(merged.items, previous.items);
        assert_eq!(merged.total_estimated_cost, 300);
        assert_eq!(merged.raw_state, RawState::DmRejected);
    }

    #[test]
    fn replaced_items_recompute_total() {
        let previous = purchase();
        let patch = RequestPatch {
            items: Some(vec![Item::new("Desk", 3, 250)]),
            total_estimated_cost: Some(1),
            ..RequestPatch::default()
        };

        let merged = merge(&previous, patch);

        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.total_estimated_cost, 750);
    }

    #[test]
    fn empty_patch_is_identity() {
        let previous = purchase();
        assert!(RequestPatch::new().is_empty());
        assert_eq!(merge(&previous, RequestPatch::new()), previous);
    }

    #[test]
    fn selection_applies_without_quotes() {
        let mut previous = purchase();
        previous.raw_state = RawState::DmApproved;
        previous.quotes = vec![Quote::new(1, "Acme", 100)];

        let merged = merge(&previous, RequestPatch::new().with_selected_quote(QuoteId(1)));

        assert_eq!(merged.quotes, previous.quotes);
        assert_eq!(merged.selected_quote_id, Some(QuoteId(1)));
    }
}
