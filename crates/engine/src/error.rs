// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use thiserror::Error;

/// Errors crossing engine operation boundaries. Domain errors from the
/// store and ledger pass through unchanged so callers can match on them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] fuel_storage::StoreError),

    #[error(transparent)]
    Ledger(#[from] fuel_storage::LedgerError),

    #[error(transparent)]
    Process(#[from] fuel_adapters::ProcessError),

    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),
}
