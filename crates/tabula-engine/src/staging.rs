// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use tabula_model::{Cell, Header};

use crate::table::{BackingTable, CellEdit, Envelope};

/// Unsaved rows awaiting commit. The table always ends in exactly one
/// all-default row so the user can start a new entry; every mutation
/// re-establishes that invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    table: BackingTable,
    default_row: Vec<Cell>,
}

impl StagingTable {
    pub fn new(header: Header) -> Self {
        let default_row = vec![Cell::Empty; header.len()];
        let mut staging = Self {
            table: BackingTable::new(header),
            default_row,
        };
        staging.ensure_trailing_default();
        staging
    }

    /// Preset cells for newly grown rows, e.g. a class name when the
    /// view is scoped to one class.
    pub fn set_default_row(&mut self, entries: &[(usize, Cell)]) {
        let mut default_row = vec![Cell::Empty; self.table.column_count()];
        for (column, value) in entries {
            if let Some(slot) = default_row.get_mut(*column) {
                *slot = value.clone();
            }
        }
        self.default_row = default_row;
        let count = self.table.row_count();
        let trailing_blank = count > 0
            && self
                .table
                .row(count - 1)
                .is_some_and(|row| row.iter().all(Cell::is_blank));
        if trailing_blank
            && let Some(slot) = self.table.row_mut(count - 1)
        {
            slot.clone_from(&self.default_row);
        }
        self.ensure_trailing_default();
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.table.column_count()
    }

    pub fn value_at(&self, row: usize, column: usize) -> Option<&Cell> {
        self.table.value_at(row, column)
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.table.row(row)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        self.table.rows()
    }

    pub fn set_value(&mut self, row: usize, column: usize, value: Cell) -> bool {
        self.table.set_value(row, column, value)
    }

    pub fn is_default_row(&self, row: usize) -> bool {
        self.table.row(row) == Some(self.default_row.as_slice())
    }

    /// Batch write; writing into the trailing default row grows the
    /// table by one so a fresh entry row is always available.
    pub fn set_values(&mut self, edits: &[CellEdit]) -> Option<Envelope> {
        let envelope = self.table.set_values(edits)?;
        self.ensure_trailing_default();
        Some(envelope)
    }

    pub fn insert_rows(&mut self, at: usize, count: usize) -> bool {
        if !self.table.insert_rows(at, count) {
            return false;
        }
        for row in at..at + count {
            if let Some(slot) = self.table.row_mut(row) {
                slot.clone_from(&self.default_row);
            }
        }
        true
    }

    pub fn remove_rows(&mut self, at: usize, count: usize) -> bool {
        if !self.table.remove_rows(at, count) {
            return false;
        }
        self.ensure_trailing_default();
        true
    }

    /// Remove the given rows (promotion into a backing table), returning
    /// them in their original order.
    pub fn take_rows(&mut self, rows: &[usize]) -> Vec<Vec<Cell>> {
        let mut sorted = rows.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut taken = Vec::with_capacity(sorted.len());
        for row in sorted.iter().rev() {
            if let Some(data) = self.table.take_row(*row) {
                taken.push(data);
            }
        }
        taken.reverse();
        self.ensure_trailing_default();
        taken
    }

    fn ensure_trailing_default(&mut self) {
        let count = self.table.row_count();
        if count == 0 || self.table.row(count - 1) != Some(self.default_row.as_slice()) {
            self.table.push_row(self.default_row.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StagingTable;
    use crate::table::CellEdit;
    use tabula_model::{Cell, TableKind, object_value as col};

    fn staging() -> StagingTable {
        StagingTable::new(TableKind::ObjectParameterValue.header())
    }

    #[test]
    fn starts_with_one_default_row() {
        let staging = staging();
        assert_eq!(staging.row_count(), 1);
        assert!(staging.is_default_row(0));
    }

    #[test]
    fn writing_last_row_grows_by_one() {
        let mut staging = staging();
        staging
            .set_values(&[CellEdit::new(0, col::OBJECT_NAME, "nemo")])
            .expect("edit should apply");

        assert_eq!(staging.row_count(), 2);
        assert!(!staging.is_default_row(0));
        assert!(staging.is_default_row(1));
    }

    #[test]
    fn blank_rewrite_of_last_row_does_not_grow() {
        let mut staging = staging();
        staging
            .set_values(&[CellEdit::new(0, col::VALUE, Cell::Empty)])
            .expect("edit should apply");
        assert_eq!(staging.row_count(), 1);
    }

    #[test]
    fn removing_trailing_row_restores_it() {
        let mut staging = staging();
        staging
            .set_values(&[CellEdit::new(0, col::OBJECT_NAME, "nemo")])
            .expect("edit should apply");

        assert!(staging.remove_rows(1, 1));
        assert_eq!(staging.row_count(), 2);
        assert!(staging.is_default_row(1));
    }

    #[test]
    fn take_rows_returns_original_order_and_restores_invariant() {
        let mut staging = staging();
        staging
            .set_values(&[
                CellEdit::new(0, col::OBJECT_NAME, "first"),
                CellEdit::new(1, col::OBJECT_NAME, "second"),
            ])
            .expect("edit should apply");
        assert_eq!(staging.row_count(), 3);

        let taken = staging.take_rows(&[1, 0]);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0][col::OBJECT_NAME], Cell::text("first"));
        assert_eq!(taken[1][col::OBJECT_NAME], Cell::text("second"));
        assert_eq!(staging.row_count(), 1);
        assert!(staging.is_default_row(0));
    }

    #[test]
    fn default_row_template_applies_to_new_rows() {
        let mut staging = staging();
        staging.set_default_row(&[(col::OBJECT_CLASS_NAME, Cell::text("fish"))]);
        assert!(staging.insert_rows(0, 1));
        assert_eq!(
            staging.value_at(0, col::OBJECT_CLASS_NAME),
            Some(&Cell::text("fish"))
        );
    }
}
