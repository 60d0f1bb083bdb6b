//! Walks a purchase request from draft to final approval against a
//! throwaway sled database, printing what each actor is allowed to do.
//!
//! Run with `cargo run --example workflow [config.toml]`.
use anyhow::Context;
use request_approval::{
    Actor, Request, Role,
    config::EngineConfig,
    dispatch::Command,
    ledger::{NewQuote, QuoteSelection},
    logging,
    request::{RequestDetails, RequestKind},
    service::RecordStore,
    session::RequestSession,
};
use std::sync::Arc;

fn show(request: &Request, actors: &[Actor], session: &RequestSession) -> anyhow::Result<()> {
    println!("{} is {} ({})", request.id, request.status(), request.raw_state);
    for actor in actors {
        let decision = session.decision(actor)?;
        match decision.hint {
            Some(hint) => println!("  {:<14} -> {hint}", actor.role.to_string()),
            None => println!("  {:<14} -> {:?}", actor.role.to_string(), decision.permitted),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    logging::init(&config.logging)?;

    let db = sled::Config::new().temporary(true).open()?;
    let store = RecordStore::with_config(Arc::new(db), &config);

    let requester = Actor::new(7, Role::Requester);
    let direct_manager = Actor::new(2, Role::DirectManager);
    let accountant = Actor::new(3, Role::Accountant);
    let final_manager = Actor::new(4, Role::FinalManager);
    let everyone = [requester, direct_manager, accountant, final_manager];

    let details = RequestDetails::new()
        .set_kind(RequestKind::Purchase)
        .set_requester(requester.id)
        .set_direct_manager(direct_manager.id)
        .add_item("Standing desk", 2, 120)
        .add_item("Monitor arm", 1, 60);

    let request = store.create_request(&requester, details)?;
    let id = request.id.clone();
    let mut session = RequestSession::new(request);
    show(session.snapshot(), &everyone, &session)?;

    let steps = [
        (requester, Command::SubmitDraft),
        (direct_manager, Command::Approve { comment: None }),
        (
            accountant,
            Command::AddQuote(NewQuote::new("Acme", 310, "files/acme.pdf")),
        ),
        (
            accountant,
            Command::AddQuote(NewQuote::new("Globex", 280, "files/globex.pdf")),
        ),
        (final_manager, Command::SelectQuote(QuoteSelection::AutoLowest)),
        (final_manager, Command::Approve { comment: Some("ok".into()) }),
    ];

    for (actor, command) in steps {
        println!("\n{} performs {}", actor.role, command.action());
        session.perform(&actor, &command, &store)?;
        show(session.snapshot(), &everyone, &session)?;
    }

    println!("\nhistory:");
    for line in store.history(&id)?.view_history() {
        println!("  {line}");
    }

    Ok(())
}
