// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use doclife_core::Row;

use crate::Filter;

/// Interface for reading and writing rows of doctype tables.
///
/// Implementations do not manage transactions by themselves, all methods run inside the
/// transaction begun by the caller (see `Transaction`) or are applied immediately if there is
/// none.
pub trait RowStore {
    type Error: Error + Send + Sync + 'static;

    /// Get a row by its name.
    ///
    /// With `for_update` the row is read with the intent to write it in the same transaction and
    /// locked against concurrent writers until the transaction ends.
    fn get_row(
        &self,
        doctype: &str,
        name: &str,
        for_update: bool,
    ) -> impl Future<Output = Result<Option<Row>, Self::Error>>;

    /// Get all rows matching the filter, ordered by `idx` and then by `name`.
    fn get_rows(
        &self,
        doctype: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>>;

    /// Insert a row.
    ///
    /// Returns `true` when the insert occurred, or `false` when a row with the same name already
    /// existed and no insertion occurred.
    fn insert_row(&self, doctype: &str, row: Row)
    -> impl Future<Output = Result<bool, Self::Error>>;

    /// Overwrite the given columns of a row, other columns keep their values.
    ///
    /// Returns `false` when the row was not found.
    fn update_row(
        &self,
        doctype: &str,
        name: &str,
        values: Row,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Delete all rows matching the filter and return how many were removed.
    fn delete_rows(
        &self,
        doctype: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Get the row of a single doctype.
    fn get_single(&self, doctype: &str) -> impl Future<Output = Result<Option<Row>, Self::Error>>;

    /// Replace the row of a single doctype.
    fn set_single(&self, doctype: &str, row: Row) -> impl Future<Output = Result<(), Self::Error>>;

    /// Increment the counter of a naming series and return the new value, starting at 1.
    fn next_series(&self, prefix: &str) -> impl Future<Output = Result<u64, Self::Error>>;
}
