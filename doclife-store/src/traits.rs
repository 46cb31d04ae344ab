// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Traits to implement database transaction provider.
///
/// To guard against sharing transactions unknowingly across unrelated queries, a concept of a
/// "permit" is used which does not protect from misuse but helps to make "holding" a transaction
/// explicit. Writes issued while no transaction was begun are applied immediately.
pub trait Transaction {
    type Error: Error + Send + Sync + 'static;

    type Permit;

    /// Begins a transaction.
    ///
    /// Transactions are strictly serialized. Any concurrent caller awaits here until the current
    /// permit holder committed or rolled back, which also makes "select for update" reads inside
    /// a transaction exclusive.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Rolls back the transaction and with that all uncommitted changes.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}
