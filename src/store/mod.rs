//! Record store for deduplicated persistence of fetched items
//!
//! This module owns the on-disk record files for both record kinds
//! (contents = parent posts, comments = child records), including:
//! - JSON backing files with an in-memory existing-id index per kind
//! - Idempotent writes: a previously-seen identifier is a skip, not an error
//! - Optional CSV export with a header derived from the first record
//! - Read-only projections used to reconcile the ledger against what was
//!   actually persisted

mod csv;
mod kind;
mod record_store;

pub use kind::RecordKind;
pub use record_store::{Record, RecordStore, StoreError, WriteOutcome};

pub(crate) use csv::{csv_header, csv_row};
