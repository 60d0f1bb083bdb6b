//! Core request records: line items, vendor quotes and the lifecycle states
use super::actor::ActorId;
use super::error::ValidationError;
use super::status::{Status, derive_status};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    #[n(0)]
    Purchase,
    #[n(1)]
    Project,
}

/// Lifecycle value persisted by the system of record.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawState {
    #[n(0)]
    Draft,
    #[n(1)]
    Submitted,
    #[n(2)]
    DmApproved,
    #[n(3)]
    DmRejected,
    #[n(4)]
    AcctApproved,
    #[n(5)]
    AcctRejected,
    #[n(6)]
    FinalApproved,
    #[n(7)]
    FinalRejected,
    #[n(8)]
    FundsTransferred,
    #[n(9)]
    Processing,
    #[n(10)]
    Done,
    #[n(11)]
    Paid,
}

impl RawState {
    pub const ALL: [RawState; 12] = [
        RawState::Draft,
        RawState::Submitted,
        RawState::DmApproved,
        RawState::DmRejected,
        RawState::AcctApproved,
        RawState::AcctRejected,
        RawState::FinalApproved,
        RawState::FinalRejected,
        RawState::FundsTransferred,
        RawState::Processing,
        RawState::Done,
        RawState::Paid,
    ];

    /// Wire name used by the system of record
    pub fn as_str(&self) -> &'static str {
        match self {
            RawState::Draft => "DRAFT",
            RawState::Submitted => "SUBMITTED",
            RawState::DmApproved => "DM_APPROVED",
            RawState::DmRejected => "DM_REJECTED",
            RawState::AcctApproved => "ACCT_APPROVED",
            RawState::AcctRejected => "ACCT_REJECTED",
            RawState::FinalApproved => "FINAL_APPROVED",
            RawState::FinalRejected => "FINAL_REJECTED",
            RawState::FundsTransferred => "FUNDS_TRANSFERRED",
            RawState::Processing => "PROCESSING",
            RawState::Done => "DONE",
            RawState::Paid => "PAID",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            RawState::DmRejected | RawState::AcctRejected | RawState::FinalRejected
        )
    }
}

impl fmt::Display for RawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RawState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownState(s.to_string()))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(#[n(0)] pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId(value.to_string())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteId(#[n(0)] pub u64);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// amounts are integer minor currency units
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Item {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub quantity: u32,
    #[n(2)]
    pub estimated_cost: u64, // per unit
}

impl Item {
    pub fn new(name: &str, quantity: u32, estimated_cost: u64) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            estimated_cost,
        }
    }
    pub fn line_total(&self) -> u64 {
        self.estimated_cost.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    #[n(0)]
    pub id: QuoteId,
    #[n(1)]
    pub vendor_name: String,
    #[n(2)]
    pub quote_total: u64,
    #[n(3)]
    pub file_url: Option<String>,
    #[n(4)]
    pub notes: Option<String>,
}

impl Quote {
    pub fn new(id: u64, vendor_name: &str, quote_total: u64) -> Self {
        Self {
            id: QuoteId(id),
            vendor_name: vendor_name.to_string(),
            quote_total,
            file_url: None,
            notes: None,
        }
    }
}

/// Informational fields carried by project requests only.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ProjectDetails {
    #[n(0)]
    pub client_name: String,
    #[n(1)]
    pub location: String,
    #[n(2)]
    pub start_time: TimeStamp<Utc>,
    #[n(3)]
    pub end_time: TimeStamp<Utc>,
    #[n(4)]
    pub total_cost: u64,
    #[n(5)]
    pub total_benefit: i64,
    #[n(6)]
    pub total_price: u64,
    #[n(7)]
    pub active_from: Option<TimeStamp<Utc>>,
}

impl ProjectDetails {
    pub fn validate_schedule(&self) -> bool {
        self.start_time.to_datetime_utc() <= self.end_time.to_datetime_utc()
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Request {
    #[n(0)]
    pub id: RequestId,
    #[n(1)]
    pub kind: RequestKind,
    #[n(2)]
    pub raw_state: RawState,
    #[n(3)]
    pub requester_id: ActorId,
    #[n(4)]
    pub direct_manager_id: Option<ActorId>,
    #[n(5)]
    pub items: Vec<Item>,
    #[n(6)]
    pub total_estimated_cost: u64,
    #[n(7)]
    pub quotes: Vec<Quote>,
    #[n(8)]
    pub selected_quote_id: Option<QuoteId>,
    #[n(9)]
    pub rejection_reason: Option<String>,
    #[n(10)]
    pub project: Option<ProjectDetails>,
}

impl Request {
    pub fn status(&self) -> Status {
        derive_status(self.raw_state, self.kind, self.quotes.len())
    }
    pub fn quote(&self, id: QuoteId) -> Option<&Quote> {
        self.quotes.iter().find(|quote| quote.id == id)
    }
    pub fn selected_quote(&self) -> Option<&Quote> {
        self.selected_quote_id.and_then(|id| self.quote(id))
    }
}

/// Sum of `quantity * estimated_cost` over every item
pub fn total_of(items: &[Item]) -> u64 {
    items
        .iter()
        .fold(0u64, |total, item| total.saturating_add(item.line_total()))
}

// Used for constructing drafts
#[derive(Debug, Default, Clone)]
pub struct RequestDetails {
    kind: Option<RequestKind>,
    requester_id: Option<ActorId>,
    direct_manager_id: Option<ActorId>,
    items: Vec<Item>,
    project: Option<ProjectDetails>,
}

impl RequestDetails {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn set_requester(mut self, requester_id: ActorId) -> Self {
        self.requester_id = Some(requester_id);
        self
    }
    pub fn set_direct_manager(mut self, manager_id: ActorId) -> Self {
        self.direct_manager_id = Some(manager_id);
        self
    }
    pub fn add_item(mut self, name: &str, quantity: u32, estimated_cost: u64) -> Self {
        self.items.push(Item::new(name, quantity, estimated_cost));
        self
    }
    pub fn set_project(mut self, project: ProjectDetails) -> Self {
        self.project = Some(project);
        self
    }
    pub fn kind(&self) -> Option<RequestKind> {
        self.kind
    }

    /// Checks fields and returns a fresh draft under the given id.
    pub fn finalise(self, id: RequestId) -> Result<Request, ValidationError> {
        let kind = self.kind.ok_or(ValidationError::MissingField("a kind"))?;
        let requester_id = self
            .requester_id
            .ok_or(ValidationError::MissingField("a requester"))?;

        if let Some(item) = self
            .items
            .iter()
            .find(|item| item.name.trim().is_empty() || item.quantity == 0)
        {
            return Err(ValidationError::InvalidItem(item.name.clone()));
        }

        match (kind, &self.project) {
            (RequestKind::Purchase, Some(_)) => {
                return Err(ValidationError::UnexpectedProjectDetails);
            }
            (RequestKind::Purchase, None) if self.items.is_empty() => {
                return Err(ValidationError::NoItems);
            }
            (RequestKind::Project, None) => {
                return Err(ValidationError::MissingField("project details"));
            }
            (RequestKind::Project, Some(project)) if !project.validate_schedule() => {
                return Err(ValidationError::InvalidSchedule);
            }
            _ => {}
        }

        let total_estimated_cost = total_of(&self.items);

        Ok(Request {
            id,
            kind,
            raw_state: RawState::Draft,
            requester_id,
            direct_manager_id: self.direct_manager_id,
            items: self.items,
            total_estimated_cost,
            quotes: vec![],
            selected_quote_id: None,
            rejection_reason: None,
            project: self.project,
        })
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
