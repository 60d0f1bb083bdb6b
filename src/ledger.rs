//! Vendor quotes attached to purchase requests and the selection contract
use super::error::{InvariantError, ValidationError};
use super::request::{Quote, QuoteId, RawState, Request, RequestKind};

/// Payload an accountant submits to attach a vendor quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuote {
    pub vendor_name: String,
    pub quote_total: u64,
    pub file_url: String,
    pub notes: Option<String>,
}

impl NewQuote {
    pub fn new(vendor_name: &str, quote_total: u64, file_url: &str) -> Self {
        Self {
            vendor_name: vendor_name.to_string(),
            quote_total,
            file_url: file_url.to_string(),
            notes: None,
        }
    }
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vendor_name.trim().is_empty() {
            return Err(ValidationError::EmptyVendorName);
        }
        if self.file_url.trim().is_empty() {
            return Err(ValidationError::EmptyFileUrl);
        }
        Ok(())
    }
    pub fn into_quote(self, id: QuoteId) -> Quote {
        Quote {
            id,
            vendor_name: self.vendor_name,
            quote_total: self.quote_total,
            file_url: Some(self.file_url),
            notes: self.notes,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSelection {
    #[n(0)]
    Quote(#[n(0)] QuoteId),
    /// Ask the system of record to pick; it echoes back the chosen id
    #[n(1)]
    AutoLowest,
}

/// Quotes are only managed on a purchase that the direct manager approved.
pub fn accepts_quotes(request: &Request) -> bool {
    request.kind == RequestKind::Purchase && request.raw_state == RawState::DmApproved
}

pub fn next_quote_id(quotes: &[Quote]) -> QuoteId {
    let highest = quotes.iter().map(|quote| quote.id.0).max().unwrap_or(0);
    QuoteId(highest + 1)
}

/// Returns a new snapshot with the quote appended under a fresh id.
pub fn append_quote(request: &Request, quote: NewQuote) -> Result<Request, ValidationError> {
    if !accepts_quotes(request) {
        return Err(ValidationError::QuotesClosed);
    }
    quote.validate()?;

    let mut next = request.clone();
    let id = next_quote_id(&next.quotes);
    next.quotes.push(quote.into_quote(id));
    Ok(next)
}

pub fn validate_selection(
    request: &Request,
    selection: &QuoteSelection,
) -> Result<(), ValidationError> {
    if !accepts_quotes(request) {
        return Err(ValidationError::QuotesClosed);
    }
    if request.quotes.is_empty() {
        return Err(ValidationError::NoQuotes);
    }
    match selection {
        QuoteSelection::Quote(id) if request.quote(*id).is_none() => {
            Err(ValidationError::QuoteNotFound(*id))
        }
        _ => Ok(()),
    }
}

/// Cheapest quote, the earliest one winning a tie.
pub fn lowest_quote(quotes: &[Quote]) -> Option<&Quote> {
    quotes.iter().reduce(|best, quote| {
        if quote.quote_total < best.quote_total {
            quote
        } else {
            best
        }
    })
}

pub fn resolve_selection(
    request: &Request,
    selection: &QuoteSelection,
) -> Result<QuoteId, ValidationError> {
    validate_selection(request, selection)?;
    match selection {
        QuoteSelection::Quote(id) => Ok(*id),
        QuoteSelection::AutoLowest => lowest_quote(&request.quotes)
            .map(|quote| quote.id)
            .ok_or(ValidationError::NoQuotes),
    }
}

/// A selected quote id must name a quote currently on the request.
pub fn check_selection(request: &Request) -> Result<(), InvariantError> {
    match request.selected_quote_id {
        Some(quote_id) if request.quote(quote_id).is_none() => {
            Err(InvariantError::DanglingSelectedQuote {
                request_id: request.id.clone(),
                quote_id,
            })
        }
        _ => Ok(()),
    }
}
