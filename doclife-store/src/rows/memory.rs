// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use doclife_core::row::{IDX, NAME};
use doclife_core::{Row, Value};

use crate::Filter;
use crate::memory::MemoryStore;
use crate::rows::RowStore;

fn sort_key(row: &Row) -> (i64, String) {
    let idx = row.get(IDX).and_then(Value::as_i64).unwrap_or_default();
    (idx, row.name().to_owned())
}

impl RowStore for MemoryStore {
    type Error = Infallible;

    // Rows are only locked through the transaction permit, which is exclusive already.
    async fn get_row(
        &self,
        doctype: &str,
        name: &str,
        _for_update: bool,
    ) -> Result<Option<Row>, Self::Error> {
        let tables = self.read_tables();
        Ok(tables
            .rows
            .get(doctype)
            .and_then(|rows| rows.get(name))
            .cloned())
    }

    async fn get_rows(&self, doctype: &str, filter: &Filter) -> Result<Vec<Row>, Self::Error> {
        let tables = self.read_tables();
        let mut rows: Vec<Row> = tables
            .rows
            .get(doctype)
            .map(|rows| {
                rows.values()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(sort_key);
        Ok(rows)
    }

    async fn insert_row(&self, doctype: &str, row: Row) -> Result<bool, Self::Error> {
        let name = row.name().to_owned();
        let mut tables = self.write_tables();
        let rows = tables.rows.entry(doctype.to_owned()).or_default();
        if rows.contains_key(&name) {
            return Ok(false);
        }
        rows.insert(name, row);
        Ok(true)
    }

    async fn update_row(&self, doctype: &str, name: &str, values: Row) -> Result<bool, Self::Error> {
        let mut tables = self.write_tables();
        let Some(row) = tables
            .rows
            .get_mut(doctype)
            .and_then(|rows| rows.get_mut(name))
        else {
            return Ok(false);
        };
        row.merge(values);

        // Renaming moves the row to its new key.
        let renamed = row.name().to_owned();
        if renamed != name
            && let Some(rows) = tables.rows.get_mut(doctype)
            && let Some(row) = rows.remove(name)
        {
            rows.insert(renamed, row);
        }
        Ok(true)
    }

    async fn delete_rows(&self, doctype: &str, filter: &Filter) -> Result<u64, Self::Error> {
        let mut tables = self.write_tables();
        let Some(rows) = tables.rows.get_mut(doctype) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }

    async fn get_single(&self, doctype: &str) -> Result<Option<Row>, Self::Error> {
        Ok(self.read_tables().singles.get(doctype).cloned())
    }

    async fn set_single(&self, doctype: &str, mut row: Row) -> Result<(), Self::Error> {
        row.set(NAME, doctype);
        self.write_tables().singles.insert(doctype.to_owned(), row);
        Ok(())
    }

    async fn next_series(&self, prefix: &str) -> Result<u64, Self::Error> {
        let mut tables = self.write_tables();
        let current = tables.series.entry(prefix.to_owned()).or_default();
        *current += 1;
        Ok(*current)
    }
}
