use super::actor::{Actor, ActorId, Role};
use super::error::DispatchError;
use super::request::{QuoteId, RawState, TimeStamp};
use chrono::Utc;
use tracing::info;

/// Audit trail of the transitions a request went through.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct RequestContext {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub witness_set: Vec<Witness>,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Witness {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub actor_id: ActorId,
    #[n(2)]
    pub actor_role: Role,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub previous_hash: Option<String>, // hash of the witness before this one
    #[n(5)]
    pub witness_type: WitnessType,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum WitnessType {
    #[n(0)]
    Create,
    #[n(1)]
    Submit,
    #[n(2)]
    Approve {
        #[n(0)]
        to: RawState,
        #[n(1)]
        comment: Option<String>,
    },
    #[n(3)]
    Reject {
        #[n(0)]
        to: RawState,
        #[n(1)]
        reason: String,
    },
    #[n(4)]
    AddQuote {
        #[n(0)]
        quote_id: QuoteId,
    },
    #[n(5)]
    SelectQuote {
        #[n(0)]
        quote_id: QuoteId,
        #[n(1)]
        auto_lowest: bool,
    },
    #[n(6)]
    MarkDone,
    #[n(7)]
    ConfirmPaid {
        #[n(0)]
        payout_reference: Option<String>,
    },
    #[n(8)]
    FundsTransferred,
    #[n(9)]
    StartProcessing,
}

impl Witness {
    pub fn new(request_id: String, actor: &Actor, witness_type: WitnessType) -> Self {
        Self {
            request_id,
            actor_id: actor.id,
            actor_role: actor.role,
            timestamp: TimeStamp::new(),
            previous_hash: None,
            witness_type,
        }
    }
    /// CBOR encoding of the witness and the sha256 digest of it
    pub fn build(&self) -> Result<(String, Vec<u8>), DispatchError> {
        let cbor = minicbor::to_vec(self).map_err(|e| DispatchError::Encode(e.to_string()))?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

impl RequestContext {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            witness_set: vec![],
        }
    }

    /// Links the witness to the current head and appends it.
    pub fn insert_witness(&mut self, mut witness: Witness) -> Result<(), DispatchError> {
        witness.previous_hash = self.head_hash()?;
        self.witness_set.push(witness);
        Ok(())
    }

    pub fn head_hash(&self) -> Result<Option<String>, DispatchError> {
        match self.witness_set.last() {
            Some(witness) => Ok(Some(witness.build()?.0)),
            None => Ok(None),
        }
    }

    /// True when every witness points at the hash of its predecessor.
    pub fn verify_chain(&self) -> Result<bool, DispatchError> {
        let mut expected: Option<String> = None;
        for witness in &self.witness_set {
            if witness.previous_hash != expected {
                return Ok(false);
            }
            expected = Some(witness.build()?.0);
        }
        Ok(true)
    }

    pub fn view_history(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .witness_set
            .iter()
            .map(|witness| {
                format!(
                    "{} {} ({}) {:?}",
                    witness.timestamp.to_datetime_utc().to_rfc3339(),
                    witness.actor_id,
                    witness.actor_role,
                    witness.witness_type
                )
            })
            .collect();

        for line in &lines {
            info!(request = %self.request_id, "{line}");
        }
        lines
    }
}
