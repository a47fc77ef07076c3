//! Display-ready domain objects and the pure formatters that build them.
//!
//! Invariants at this boundary: monetary values are decimal VET strings,
//! never raw wei; timestamps are absolute UTC instants; a raw `0` in an
//! optional time field means "absent", never the unix epoch. Formatting is
//! deterministic and does no I/O.

use chrono::{DateTime, Utc};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units, ParseUnits};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::Result;

/// VET uses 18 decimal places, like most EVM-style native tokens.
const VET_DECIMALS: u32 = 18;

/// How a product is offered on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    FixedPrice,
    Auction,
}

impl ListingKind {
    pub(crate) fn from_u8(raw: u8) -> Option<ListingKind> {
        match raw {
            0 => Some(ListingKind::FixedPrice),
            1 => Some(ListingKind::Auction),
            _ => None,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ListingKind::FixedPrice => 0,
            ListingKind::Auction => 1,
        }
    }
}

/// A registered product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub token_id: u64,
    pub name: String,
    pub producer: Address,
    /// Decimal VET.
    pub price: String,
    pub created_at: DateTime<Utc>,
    pub metadata_uri: String,
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub token_id: u64,
    pub seller: Address,
    /// Decimal VET.
    pub price: String,
    pub kind: ListingKind,
    /// Absent for fixed-price listings or when no deadline was set.
    pub auction_end: Option<DateTime<Utc>>,
    pub active: bool,
}

/// One recorded checkpoint in a product's journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyChainEvent {
    pub token_id: u64,
    pub stage: String,
    pub location: String,
    pub actor: Address,
    pub recorded_at: DateTime<Utc>,
}

/// Third-party verification status of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub verifier: Address,
    pub certification: String,
    /// Absent while the product has never been verified.
    pub verified_at: Option<DateTime<Utc>>,
    pub valid: bool,
}

/// Formats wei as decimal VET, trimming trailing zeros: `1.5`, never
/// `1.500000000000000000`; whole amounts render without a fraction.
pub fn format_vet(wei: U256) -> String {
    let units = match format_units(wei, VET_DECIMALS) {
        Ok(units) => units,
        // 18 decimals is always a representable width for a U256.
        Err(_) => wei.to_string(),
    };
    let trimmed = units.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses a decimal VET amount into wei.
pub fn parse_vet(amount: &str) -> Result<U256> {
    match parse_units(amount, VET_DECIMALS) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(ChainError::Configuration(format!(
            "VET amount {amount:?} is negative"
        ))),
        Err(e) => Err(ChainError::Configuration(format!(
            "invalid VET amount {amount:?}: {e}"
        ))),
    }
}

/// Builds a [`Product`] from the raw `getProduct` outputs.
pub fn format_product(raw: &[Token]) -> Result<Product> {
    let mut fields = TupleReader::new("product", raw);
    Ok(Product {
        token_id: fields.uint64()?,
        name: fields.string()?,
        producer: fields.address()?,
        price: format_vet(fields.uint()?),
        created_at: timestamp(fields.uint()?, "product createdAt")?,
        metadata_uri: fields.string()?,
    })
}

/// Builds a [`Listing`] from the raw `getListing` outputs.
pub fn format_listing(raw: &[Token]) -> Result<Listing> {
    let mut fields = TupleReader::new("listing", raw);
    let token_id = fields.uint64()?;
    let seller = fields.address()?;
    let price = format_vet(fields.uint()?);
    let kind_raw = fields.uint8()?;
    let kind = ListingKind::from_u8(kind_raw).ok_or_else(|| ChainError::DecodeError {
        context: "listing".into(),
        reason: format!("unknown listing type {kind_raw}"),
    })?;
    let auction_end = optional_timestamp(fields.uint()?, "listing auctionEndTime")?;
    let active = fields.bool()?;
    Ok(Listing {
        token_id,
        seller,
        price,
        kind,
        auction_end,
        active,
    })
}

/// Builds the checkpoint list from the raw `getHistory` output array.
pub fn format_checkpoints(raw: &Token) -> Result<Vec<SupplyChainEvent>> {
    let items = match raw {
        Token::Array(items) => items,
        other => {
            return Err(ChainError::DecodeError {
                context: "supply-chain history".into(),
                reason: format!("expected an array, got {other:?}"),
            })
        }
    };
    items.iter().map(format_checkpoint).collect()
}

/// Builds a [`SupplyChainEvent`] from one raw checkpoint tuple.
pub fn format_checkpoint(raw: &Token) -> Result<SupplyChainEvent> {
    let entries = match raw {
        Token::Tuple(entries) => entries,
        other => {
            return Err(ChainError::DecodeError {
                context: "supply-chain checkpoint".into(),
                reason: format!("expected a tuple, got {other:?}"),
            })
        }
    };
    let mut fields = TupleReader::new("supply-chain checkpoint", entries);
    Ok(SupplyChainEvent {
        token_id: fields.uint64()?,
        stage: fields.string()?,
        location: fields.string()?,
        actor: fields.address()?,
        recorded_at: timestamp(fields.uint()?, "checkpoint timestamp")?,
    })
}

/// Builds a [`Verification`] from the raw `getVerification` outputs.
pub fn format_verification(raw: &[Token]) -> Result<Verification> {
    let mut fields = TupleReader::new("verification", raw);
    Ok(Verification {
        verifier: fields.address()?,
        certification: fields.string()?,
        verified_at: optional_timestamp(fields.uint()?, "verification verifiedAt")?,
        valid: fields.bool()?,
    })
}

/// Converts unix seconds to an absolute UTC instant.
pub(crate) fn timestamp(secs: U256, field: &str) -> Result<DateTime<Utc>> {
    let secs = uint_to_u64(secs, field)?;
    let signed = i64::try_from(secs).map_err(|_| ChainError::DecodeError {
        context: field.to_string(),
        reason: format!("timestamp {secs} out of range"),
    })?;
    DateTime::from_timestamp(signed, 0).ok_or_else(|| ChainError::DecodeError {
        context: field.to_string(),
        reason: format!("timestamp {secs} out of range"),
    })
}

/// A raw `0` in an optional time field marks absence, never the epoch.
pub(crate) fn optional_timestamp(secs: U256, field: &str) -> Result<Option<DateTime<Utc>>> {
    if secs.is_zero() {
        return Ok(None);
    }
    timestamp(secs, field).map(Some)
}

fn uint_to_u64(value: U256, field: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(ChainError::DecodeError {
            context: field.to_string(),
            reason: format!("value {value} exceeds u64 range"),
        });
    }
    Ok(value.as_u64())
}

/// Positional reader over decoded output tokens.
struct TupleReader<'a> {
    context: &'static str,
    tokens: &'a [Token],
    index: usize,
}

impl<'a> TupleReader<'a> {
    fn new(context: &'static str, tokens: &'a [Token]) -> Self {
        TupleReader {
            context,
            tokens,
            index: 0,
        }
    }

    fn next(&mut self) -> Result<&'a Token> {
        let token = self.tokens.get(self.index).ok_or_else(|| ChainError::DecodeError {
            context: self.context.to_string(),
            reason: format!(
                "expected at least {} fields, got {}",
                self.index + 1,
                self.tokens.len()
            ),
        })?;
        self.index += 1;
        Ok(token)
    }

    fn mismatch(&self, expected: &str, got: &Token) -> ChainError {
        ChainError::DecodeError {
            context: self.context.to_string(),
            reason: format!("field {} expected {expected}, got {got:?}", self.index),
        }
    }

    fn uint(&mut self) -> Result<U256> {
        match self.next()? {
            Token::Uint(value) => Ok(*value),
            other => Err(self.mismatch("uint", other)),
        }
    }

    fn uint64(&mut self) -> Result<u64> {
        let value = self.uint()?;
        if value > U256::from(u64::MAX) {
            return Err(ChainError::DecodeError {
                context: self.context.to_string(),
                reason: format!("field {} value {value} exceeds u64 range", self.index),
            });
        }
        Ok(value.as_u64())
    }

    fn uint8(&mut self) -> Result<u8> {
        let value = self.uint()?;
        if value > U256::from(u8::MAX) {
            return Err(ChainError::DecodeError {
                context: self.context.to_string(),
                reason: format!("field {} value {value} exceeds u8 range", self.index),
            });
        }
        Ok(value.as_u32() as u8)
    }

    fn address(&mut self) -> Result<Address> {
        match self.next()? {
            Token::Address(address) => Ok(*address),
            other => Err(self.mismatch("address", other)),
        }
    }

    fn string(&mut self) -> Result<String> {
        match self.next()? {
            Token::String(text) => Ok(text.clone()),
            other => Err(self.mismatch("string", other)),
        }
    }

    fn bool(&mut self) -> Result<bool> {
        match self.next()? {
            Token::Bool(flag) => Ok(*flag),
            other => Err(self.mismatch("bool", other)),
        }
    }
}
