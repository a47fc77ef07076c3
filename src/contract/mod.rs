//! Contract interaction: ABI bindings, read calls, submission and receipts.

pub mod binding;
pub mod call;
pub mod receipt;
pub mod submit;

pub use binding::{ContractBinding, ContractKind, ContractRegistry};
pub use call::{call_view, DecodedResult};
pub use receipt::{await_receipt, ClauseOutput, EventLog, PollOptions, Receipt};
pub use submit::{submit, Clause, TransactionHandle};
