//! Typed domain events decoded from raw chain logs.

use ethers::abi::{Event as AbiEvent, LogParam, RawLog, Token};
use ethers::types::{Address, U256};

use crate::contract::receipt::EventLog;
use crate::domain::{format_vet, ListingKind};
use crate::error::ChainError;
use crate::Result;

/// A chain event translated into domain terms.
///
/// Each variant carries only the fields relevant to that event; prices are
/// already decimal VET.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A producer minted a new product token.
    ProductCreated {
        token_id: u64,
        producer: Address,
        name: String,
        price: String,
    },
    /// A product was listed for sale.
    Listed {
        token_id: u64,
        seller: Address,
        price: String,
        kind: ListingKind,
    },
    /// A listed product was sold.
    Sale {
        token_id: u64,
        seller: Address,
        buyer: Address,
        price: String,
    },
}

pub(crate) fn decode_product_created(event: &AbiEvent, log: &EventLog) -> Result<DomainEvent> {
    let mut fields = parse_log(event, log)?;
    Ok(DomainEvent::ProductCreated {
        token_id: fields.uint64("tokenId")?,
        producer: fields.address("producer")?,
        name: fields.string("name")?,
        price: format_vet(fields.uint("price")?),
    })
}

pub(crate) fn decode_listed(event: &AbiEvent, log: &EventLog) -> Result<DomainEvent> {
    let mut fields = parse_log(event, log)?;
    let token_id = fields.uint64("tokenId")?;
    let seller = fields.address("seller")?;
    let price = format_vet(fields.uint("price")?);
    let kind_raw = fields.uint8("listingType")?;
    let kind = ListingKind::from_u8(kind_raw).ok_or_else(|| ChainError::DecodeError {
        context: "Listed log".into(),
        reason: format!("unknown listing type {kind_raw}"),
    })?;
    Ok(DomainEvent::Listed {
        token_id,
        seller,
        price,
        kind,
    })
}

pub(crate) fn decode_sale(event: &AbiEvent, log: &EventLog) -> Result<DomainEvent> {
    let mut fields = parse_log(event, log)?;
    Ok(DomainEvent::Sale {
        token_id: fields.uint64("tokenId")?,
        seller: fields.address("seller")?,
        buyer: fields.address("buyer")?,
        price: format_vet(fields.uint("price")?),
    })
}

fn parse_log(event: &AbiEvent, log: &EventLog) -> Result<LogFields> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.clone(),
    };
    let parsed = event.parse_log(raw).map_err(|e| ChainError::DecodeError {
        context: format!("{} log", event.name),
        reason: e.to_string(),
    })?;
    Ok(LogFields {
        event: event.name.clone(),
        params: parsed.params,
    })
}

/// Named access to the params of a parsed log.
struct LogFields {
    event: String,
    params: Vec<LogParam>,
}

impl LogFields {
    fn take(&mut self, name: &str) -> Result<Token> {
        let index = self
            .params
            .iter()
            .position(|param| param.name == name)
            .ok_or_else(|| ChainError::DecodeError {
                context: format!("{} log", self.event),
                reason: format!("missing field {name:?}"),
            })?;
        Ok(self.params.remove(index).value)
    }

    fn mismatch(&self, name: &str, expected: &str, got: &Token) -> ChainError {
        ChainError::DecodeError {
            context: format!("{} log", self.event),
            reason: format!("field {name:?} expected {expected}, got {got:?}"),
        }
    }

    fn uint(&mut self, name: &str) -> Result<U256> {
        match self.take(name)? {
            Token::Uint(value) => Ok(value),
            other => Err(self.mismatch(name, "uint", &other)),
        }
    }

    fn uint64(&mut self, name: &str) -> Result<u64> {
        let value = self.uint(name)?;
        if value > U256::from(u64::MAX) {
            return Err(ChainError::DecodeError {
                context: format!("{} log", self.event),
                reason: format!("field {name:?} value {value} exceeds u64 range"),
            });
        }
        Ok(value.as_u64())
    }

    fn uint8(&mut self, name: &str) -> Result<u8> {
        let value = self.uint(name)?;
        if value > U256::from(u8::MAX) {
            return Err(ChainError::DecodeError {
                context: format!("{} log", self.event),
                reason: format!("field {name:?} value {value} exceeds u8 range"),
            });
        }
        Ok(value.as_u32() as u8)
    }

    fn address(&mut self, name: &str) -> Result<Address> {
        match self.take(name)? {
            Token::Address(address) => Ok(address),
            other => Err(self.mismatch(name, "address", &other)),
        }
    }

    fn string(&mut self, name: &str) -> Result<String> {
        match self.take(name)? {
            Token::String(text) => Ok(text),
            other => Err(self.mismatch(name, "string", &other)),
        }
    }
}
