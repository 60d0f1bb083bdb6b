//! Property-based tests for status derivation, gating and merging
//!
//! These use proptest to check the invariants that must hold for every
//! request shape, not just the handful of scenarios in `scenarios.rs`.

use proptest::prelude::*;
use request_approval::{
    Action, Actor, ActorId, Gate, RawState, Request, RequestKind, RequestPatch, Role,
    config::GatePolicy,
    derive_status, gate, merge,
    request::{Item, Quote, QuoteId, RequestId},
};
use std::collections::BTreeSet;

// PROPERTY TEST STRATEGIES

fn state_strategy() -> impl Strategy<Value = RawState> {
    prop::sample::select(RawState::ALL.to_vec())
}

fn kind_strategy() -> impl Strategy<Value = RequestKind> {
    prop::bool::ANY.prop_map(|b| {
        if b {
            RequestKind::Purchase
        } else {
            RequestKind::Project
        }
    })
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn item_strategy() -> impl Strategy<Value = Item> {
    ("[a-z]{3,10}", 1u32..=20, 0u64..=10_000)
        .prop_map(|(name, quantity, cost)| Item::new(&name, quantity, cost))
}

fn quotes_strategy() -> impl Strategy<Value = Vec<Quote>> {
    prop::collection::vec(0u64..=50_000, 0..=5).prop_map(|totals| {
        totals
            .into_iter()
            .enumerate()
            .map(|(index, total)| Quote::new(index as u64 + 1, "vendor", total))
            .collect()
    })
}

/// A request in any state, with a selection only when it names a real quote
fn request_strategy() -> impl Strategy<Value = Request> {
    (
        kind_strategy(),
        state_strategy(),
        prop::collection::vec(item_strategy(), 1..=4),
        quotes_strategy(),
        any::<bool>(),
        1u64..=10,
    )
        .prop_map(|(kind, raw_state, items, quotes, select, requester)| {
            let selected_quote_id = if select {
                quotes.first().map(|quote| quote.id)
            } else {
                None
            };
            let total_estimated_cost = request_approval::request::total_of(&items);
            Request {
                id: RequestId::from("req_prop"),
                kind,
                raw_state,
                requester_id: ActorId(requester),
                direct_manager_id: None,
                items,
                total_estimated_cost,
                quotes,
                selected_quote_id,
                rejection_reason: None,
                project: None,
            }
        })
}

// PROPERTY TESTS
proptest! {
    /// Property: derive_status is deterministic for any input
    #[test]
    fn prop_status_is_idempotent(
        state in state_strategy(),
        kind in kind_strategy(),
        quotes in 0usize..=10,
    ) {
        let first = derive_status(state, kind, quotes);
        prop_assert_eq!(first, derive_status(state, kind, quotes));
    }

    /// Property: quote count only changes the label for a purchase at DM_APPROVED
    #[test]
    fn prop_quote_count_is_local(
        state in state_strategy(),
        kind in kind_strategy(),
        quotes in 1usize..=10,
    ) {
        let without = derive_status(state, kind, 0);
        let with = derive_status(state, kind, quotes);
        if state == RawState::DmApproved && kind == RequestKind::Purchase {
            prop_assert_ne!(without, with);
        } else {
            prop_assert_eq!(without, with);
        }
    }

    /// Property: a decision either permits something or explains why not
    #[test]
    fn prop_empty_decisions_carry_hints(
        request in request_strategy(),
        role in role_strategy(),
        actor_id in 1u64..=10,
    ) {
        let decision = gate(&Actor::new(actor_id, role), &request).unwrap();
        if decision.is_empty() {
            let hint = decision.hint.unwrap_or_default();
            prop_assert!(!hint.trim().is_empty());
        } else {
            prop_assert!(decision.hint.is_none());
        }
    }

    /// Property: approving a purchase at DM_APPROVED requires a selected quote
    #[test]
    fn prop_purchase_approval_needs_selection(request in request_strategy()) {
        let request = Request {
            kind: RequestKind::Purchase,
            raw_state: RawState::DmApproved,
            ..request
        };
        let decision = gate(&Actor::new(1, Role::FinalManager), &request).unwrap();

        prop_assert_eq!(decision.permits(Action::Approve), request.selected_quote_id.is_some());
        prop_assert_eq!(decision.permits(Action::SelectQuote), !request.quotes.is_empty());
    }

    /// Property: every permitted state-changing action has a target state
    #[test]
    fn prop_permitted_actions_have_targets(
        request in request_strategy(),
        role in role_strategy(),
    ) {
        let decision = gate(&Actor::new(request.requester_id.0, role), &request).unwrap();
        for action in decision.permitted {
            let target = action.target_state(request.kind, request.raw_state);
            match action {
                Action::AddQuote | Action::SelectQuote => prop_assert!(target.is_none()),
                _ => prop_assert!(target.is_some()),
            }
        }
    }

    /// Property: an empty patch keeps items, quotes and total
    #[test]
    fn prop_empty_patch_preserves_children(
        request in request_strategy(),
        state in state_strategy(),
    ) {
        let merged = merge(&request, RequestPatch::state(state));

        prop_assert_eq!(&merged.items, &request.items);
        prop_assert_eq!(&merged.quotes, &request.quotes);
        prop_assert_eq!(merged.total_estimated_cost, request.total_estimated_cost);
        prop_assert_eq!(merged.raw_state, state);
    }

    /// Property: replaced items always come with a consistent total
    #[test]
    fn prop_replaced_items_recompute_total(
        request in request_strategy(),
        items in prop::collection::vec(item_strategy(), 1..=4),
        reported in any::<u64>(),
    ) {
        let patch = RequestPatch {
            items: Some(items.clone()),
            total_estimated_cost: Some(reported),
            ..RequestPatch::default()
        };
        let merged = merge(&request, patch);

        prop_assert_eq!(&merged.items, &items);
        prop_assert_eq!(
            merged.total_estimated_cost,
            request_approval::request::total_of(&items)
        );
    }

    /// Property: an empty quote list in a response never erases quotes
    #[test]
    fn prop_empty_quotes_are_ignored(request in request_strategy()) {
        let patch = RequestPatch {
            quotes: Some(vec![]),
            selected_quote_id: request.quotes.last().map(|quote| quote.id),
            ..RequestPatch::default()
        };
        let merged = merge(&request, patch);

        prop_assert_eq!(&merged.quotes, &request.quotes);
        if let Some(last) = request.quotes.last() {
            prop_assert_eq!(merged.selected_quote_id, Some(last.id));
        }
    }
}

#[test]
fn dangling_selection_is_never_gated() {
    let request = Request {
        id: RequestId::from("req_dangling"),
        kind: RequestKind::Purchase,
        raw_state: RawState::DmApproved,
        requester_id: ActorId(1),
        direct_manager_id: None,
        items: vec![Item::new("Desk", 1, 10)],
        total_estimated_cost: 10,
        quotes: vec![Quote::new(1, "Acme", 10)],
        selected_quote_id: Some(QuoteId(3)),
        rejection_reason: None,
        project: None,
    };

    for role in Role::ALL {
        assert!(gate(&Actor::new(1, role), &request).is_err());
    }
}

// The permission table written out row by row. `Manager` stands in for the
// direct manager on purchases and the final manager on projects.
fn expected_permission(
    action: Action,
    role: Role,
    kind: RequestKind,
    state: RawState,
    quote_count: usize,
    selected: bool,
    is_requester: bool,
) -> bool {
    use RequestKind::{Project, Purchase};

    let role = match (role, kind) {
        (Role::Manager, Purchase) => Role::DirectManager,
        (Role::Manager, Project) => Role::FinalManager,
        (role, _) => role,
    };

    match action {
        Action::SubmitDraft => {
            state == RawState::Draft && matches!(role, Role::Requester | Role::DirectManager)
        }
        Action::Reject => {
            state == RawState::Submitted
                && ((role == Role::DirectManager && kind == Purchase)
                    || (role == Role::FinalManager && kind == Project))
        }
        Action::Approve => {
            (state == RawState::Submitted
                && ((role == Role::DirectManager && kind == Purchase)
                    || (role == Role::FinalManager && kind == Project)))
                || (state == RawState::DmApproved
                    && kind == Purchase
                    && role == Role::FinalManager
                    && selected)
        }
        Action::AddQuote => {
            state == RawState::DmApproved && kind == Purchase && role == Role::Accountant
        }
        Action::SelectQuote => {
            state == RawState::DmApproved
                && kind == Purchase
                && role == Role::FinalManager
                && quote_count > 0
        }
        Action::MarkDone => {
            state == RawState::Processing && kind == Project && role == Role::Requester && is_requester
        }
        Action::ConfirmPaid => {
            state == RawState::Done && kind == Project && role == Role::Accountant
        }
    }
}

fn request_with(
    kind: RequestKind,
    state: RawState,
    quote_count: usize,
    selected: bool,
) -> Request {
    let quotes: Vec<Quote> = (1..=quote_count as u64)
        .map(|id| Quote::new(id, "vendor", 100 * id))
        .collect();
    Request {
        id: RequestId::from("req_table"),
        kind,
        raw_state: state,
        requester_id: ActorId(7),
        direct_manager_id: Some(ActorId(2)),
        items: vec![Item::new("Desk", 1, 10)],
        total_estimated_cost: 10,
        selected_quote_id: if selected { quotes.first().map(|quote| quote.id) } else { None },
        quotes,
        rejection_reason: None,
        project: None,
    }
}

#[test]
fn gate_matches_permission_table() {
    let mut checked = 0;

    for role in Role::ALL {
        for kind in [RequestKind::Purchase, RequestKind::Project] {
            for state in RawState::ALL {
                for quote_count in [0usize, 1, 5] {
                    for selected in [false, true] {
                        if selected && quote_count == 0 {
                            continue;
                        }
                        for is_requester in [true, false] {
                            let request = request_with(kind, state, quote_count, selected);
                            let actor = Actor::new(if is_requester { 7 } else { 8 }, role);
                            let decision = gate(&actor, &request).unwrap();

                            let expected: BTreeSet<Action> = Action::ALL
                                .into_iter()
                                .filter(|action| {
                                    expected_permission(
                                        *action,
                                        role,
                                        kind,
                                        state,
                                        quote_count,
                                        selected,
                                        is_requester,
                                    )
                                })
                                .collect();

                            assert_eq!(
                                decision.permitted, expected,
                                "{role} {kind:?} {state} quotes={quote_count} selected={selected} requester={is_requester}"
                            );
                            assert_eq!(decision.hint.is_some(), expected.is_empty());
                            checked += 1;
                        }
                    }
                }
            }
        }
    }

    assert_eq!(checked, 7 * 2 * 12 * 5 * 2);
}

#[test]
fn strict_policy_leaves_manager_without_actions() {
    let strict = Gate::new(GatePolicy {
        assume_unknown_manager: false,
    });

    for kind in [RequestKind::Purchase, RequestKind::Project] {
        for state in RawState::ALL {
            let request = request_with(kind, state, 1, true);
            let decision = strict.evaluate(&Actor::new(2, Role::Manager), &request).unwrap();

            assert!(decision.is_empty(), "{kind:?} {state}");
            assert!(decision.hint.is_some());
        }
    }
}
