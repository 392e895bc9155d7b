// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use tabula_model::{Cell, Header};

/// One cell write. Rows are local to the table the edit is applied to;
/// the composite router uses the same type with global rows before
/// partitioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: usize,
    pub column: usize,
    pub value: Cell,
}

impl CellEdit {
    pub fn new(row: usize, column: usize, value: impl Into<Cell>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
        }
    }
}

/// Rectangle spanned by a batch edit, for change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Envelope {
    fn of(edits: &[CellEdit]) -> Option<Self> {
        let first = edits.first()?;
        let mut envelope = Self {
            top: first.row,
            bottom: first.row,
            left: first.column,
            right: first.column,
        };
        for edit in &edits[1..] {
            envelope.top = envelope.top.min(edit.row);
            envelope.bottom = envelope.bottom.max(edit.row);
            envelope.left = envelope.left.min(edit.column);
            envelope.right = envelope.right.max(edit.column);
        }
        Some(envelope)
    }
}

/// Committed rows of one entity class, stored as a dense grid aligned to
/// the kind-wide header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingTable {
    header: Header,
    rows: Vec<Vec<Cell>>,
}

impl BackingTable {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(header: Header, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == header.len()));
        Self { header, rows }
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn value_at(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(column)
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn column_values(&self, column: usize) -> Option<Vec<&Cell>> {
        if column >= self.header.len() {
            return None;
        }
        Some(self.rows.iter().map(|row| &row[column]).collect())
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut Vec<Cell>> {
        self.rows.get_mut(row)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Cell>] {
        &mut self.rows
    }

    /// Batch write. The whole batch is rejected when it is empty or any
    /// target falls outside the grid; there is no partial application
    /// and no clamping.
    pub fn set_values(&mut self, edits: &[CellEdit]) -> Option<Envelope> {
        if edits.is_empty() {
            return None;
        }
        let in_range = edits
            .iter()
            .all(|edit| edit.row < self.rows.len() && edit.column < self.header.len());
        if !in_range {
            return None;
        }
        for edit in edits {
            self.rows[edit.row][edit.column] = edit.value.clone();
        }
        Envelope::of(edits)
    }

    pub fn set_value(&mut self, row: usize, column: usize, value: Cell) -> bool {
        self.set_values(&[CellEdit { row, column, value }]).is_some()
    }

    pub fn insert_rows(&mut self, at: usize, count: usize) -> bool {
        if at > self.rows.len() || count < 1 {
            return false;
        }
        let width = self.header.len();
        for offset in 0..count {
            self.rows.insert(at + offset, vec![Cell::Empty; width]);
        }
        true
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn remove_rows(&mut self, at: usize, count: usize) -> bool {
        if count < 1 || at.checked_add(count).is_none_or(|end| end > self.rows.len()) {
            return false;
        }
        self.rows.drain(at..at + count);
        true
    }

    pub fn take_row(&mut self, row: usize) -> Option<Vec<Cell>> {
        if row >= self.rows.len() {
            return None;
        }
        Some(self.rows.remove(row))
    }

    /// Remove the rows whose index the predicate selects, scanning from
    /// the bottom so earlier indexes stay valid.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{BackingTable, CellEdit};
    use tabula_model::{Cell, TableKind, object_value as col};

    fn empty_table() -> BackingTable {
        BackingTable::new(TableKind::ObjectParameterValue.header())
    }

    #[test]
    fn batch_edit_reports_envelope() {
        let mut table = empty_table();
        assert!(table.insert_rows(0, 3));

        let envelope = table
            .set_values(&[
                CellEdit::new(0, col::VALUE, "1"),
                CellEdit::new(2, col::OBJECT_NAME, "nemo"),
            ])
            .expect("edit should apply");
        assert_eq!((envelope.top, envelope.bottom), (0, 2));
        assert_eq!((envelope.left, envelope.right), (col::OBJECT_NAME, col::VALUE));
        assert_eq!(table.value_at(2, col::OBJECT_NAME), Some(&Cell::text("nemo")));
    }

    #[test]
    fn out_of_range_edit_rejects_whole_batch() {
        let mut table = empty_table();
        table.insert_rows(0, 1);

        let rejected = table.set_values(&[
            CellEdit::new(0, col::VALUE, "ok"),
            CellEdit::new(5, col::VALUE, "oob"),
        ]);
        assert!(rejected.is_none());
        assert_eq!(table.value_at(0, col::VALUE), Some(&Cell::Empty));
    }

    #[test]
    fn insert_allows_end_remove_requires_full_range() {
        let mut table = empty_table();
        assert!(table.insert_rows(0, 2));
        assert!(table.insert_rows(2, 1));
        assert!(!table.insert_rows(5, 1));

        assert!(!table.remove_rows(2, 2));
        assert!(table.remove_rows(1, 2));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn column_values_follow_row_order() {
        let mut table = empty_table();
        table.insert_rows(0, 2);
        table.set_value(0, col::VALUE, Cell::text("a"));
        table.set_value(1, col::VALUE, Cell::text("b"));

        let values = table.column_values(col::VALUE).expect("column in range");
        assert_eq!(values, vec![&Cell::text("a"), &Cell::text("b")]);
        assert!(table.column_values(99).is_none());
    }

    #[test]
    fn retain_rows_counts_removals() {
        let mut table = empty_table();
        table.insert_rows(0, 3);
        table.set_value(1, col::OBJECT_ID, Cell::Id(7));

        let removed = table.retain_rows(|row| row[col::OBJECT_ID] != Cell::Id(7));
        assert_eq!(removed, 1);
        assert_eq!(table.row_count(), 2);
    }
}
