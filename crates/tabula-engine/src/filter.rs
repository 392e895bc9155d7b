// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use tabula_model::{
    Cell, TableKind, object_value, relationship_value, split_ids,
};

/// Row visibility filter for one backing table: a definition-id
/// selection, an owner selection, and per-column excluded-value sets
/// ("auto filters"). An empty selection set places no restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    definition_id_column: usize,
    owner_column: Option<usize>,
    owner_is_list: bool,
    definition_ids: BTreeSet<i64>,
    owner_ids: BTreeSet<i64>,
    owner_id_lists: BTreeSet<String>,
    filtered_out: BTreeMap<usize, BTreeSet<Cell>>,
}

impl RowFilter {
    pub fn new(kind: TableKind) -> Self {
        let (definition_id_column, owner_column, owner_is_list) = match kind {
            TableKind::ObjectParameterValue => (
                object_value::PARAMETER_ID,
                Some(object_value::OBJECT_ID),
                false,
            ),
            TableKind::RelationshipParameterValue => (
                relationship_value::PARAMETER_ID,
                Some(relationship_value::OBJECT_ID_LIST),
                true,
            ),
            // Definition rows are selected by their own identity.
            TableKind::ObjectParameterDefinition
            | TableKind::RelationshipParameterDefinition => (kind.id_column(), None, false),
        };
        Self {
            definition_id_column,
            owner_column,
            owner_is_list,
            definition_ids: BTreeSet::new(),
            owner_ids: BTreeSet::new(),
            owner_id_lists: BTreeSet::new(),
            filtered_out: BTreeMap::new(),
        }
    }

    /// Replace the selection sets. Returns true when anything changed
    /// and cached pass/fail decisions must be recomputed.
    pub fn set_selection(
        &mut self,
        definition_ids: BTreeSet<i64>,
        owner_ids: BTreeSet<i64>,
        owner_id_lists: BTreeSet<String>,
    ) -> bool {
        if definition_ids == self.definition_ids
            && owner_ids == self.owner_ids
            && owner_id_lists == self.owner_id_lists
        {
            return false;
        }
        self.definition_ids = definition_ids;
        self.owner_ids = owner_ids;
        self.owner_id_lists = owner_id_lists;
        true
    }

    /// Replace one column's excluded-value set. Returns true when the
    /// set actually changed.
    pub fn set_filtered_out(&mut self, column: usize, values: BTreeSet<Cell>) -> bool {
        if self.filtered_out.get(&column).is_some_and(|old| *old == values)
            || (values.is_empty() && !self.filtered_out.contains_key(&column))
        {
            return false;
        }
        if values.is_empty() {
            self.filtered_out.remove(&column);
        } else {
            self.filtered_out.insert(column, values);
        }
        true
    }

    pub fn clear_filtered_out(&mut self) -> bool {
        if self.filtered_out.is_empty() {
            return false;
        }
        self.filtered_out.clear();
        true
    }

    /// Whether a data change in this column can change pass/fail
    /// decisions.
    pub fn is_active_column(&self, column: usize) -> bool {
        if self.filtered_out.contains_key(&column) {
            return true;
        }
        if column == self.definition_id_column && !self.definition_ids.is_empty() {
            return true;
        }
        self.owner_column == Some(column)
            && (!self.owner_ids.is_empty() || !self.owner_id_lists.is_empty())
    }

    /// Selection predicate: definition membership plus owner membership.
    pub fn main_accepts(&self, row: &[Cell]) -> bool {
        if !self.definition_ids.is_empty() {
            let id = row
                .get(self.definition_id_column)
                .and_then(Cell::as_id);
            if !id.is_some_and(|id| self.definition_ids.contains(&id)) {
                return false;
            }
        }
        let Some(owner_column) = self.owner_column else {
            return true;
        };
        if self.owner_is_list {
            let Some(list) = row.get(owner_column) else {
                return true;
            };
            if !self.owner_id_lists.is_empty() {
                return self.owner_id_lists.contains(&list.display());
            }
            if !self.owner_ids.is_empty() {
                let member_ids = list
                    .as_text()
                    .and_then(split_ids)
                    .unwrap_or_default();
                return member_ids.iter().any(|id| self.owner_ids.contains(id));
            }
            return true;
        }
        if self.owner_ids.is_empty() {
            return true;
        }
        row.get(owner_column)
            .and_then(Cell::as_id)
            .is_some_and(|id| self.owner_ids.contains(&id))
    }

    /// Excluded-value predicate. The ignored column is skipped so a
    /// column's own facet candidates are not hidden by its own filter.
    pub fn auto_filter_accepts(&self, row: &[Cell], ignored: Option<usize>) -> bool {
        for (column, values) in &self.filtered_out {
            if ignored == Some(*column) {
                continue;
            }
            if row.get(*column).is_some_and(|cell| values.contains(cell)) {
                return false;
            }
        }
        true
    }

    pub fn accepts(&self, row: &[Cell]) -> bool {
        self.main_accepts(row) && self.auto_filter_accepts(row, None)
    }

    /// Source-row indexes passing the filter, in table order.
    pub fn visible_rows(&self, rows: &[Vec<Cell>]) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, row)| self.accepts(row))
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::RowFilter;
    use std::collections::BTreeSet;
    use tabula_model::{Cell, TableKind, object_value, relationship_value};

    fn object_row(object_id: i64, parameter_id: i64, value: &str) -> Vec<Cell> {
        let mut row = vec![Cell::Empty; TableKind::ObjectParameterValue.header().len()];
        row[object_value::OBJECT_ID] = Cell::Id(object_id);
        row[object_value::PARAMETER_ID] = Cell::Id(parameter_id);
        row[object_value::VALUE] = Cell::text(value);
        row
    }

    fn relationship_row(object_id_list: &str) -> Vec<Cell> {
        let mut row = vec![Cell::Empty; TableKind::RelationshipParameterValue.header().len()];
        row[relationship_value::OBJECT_ID_LIST] = Cell::text(object_id_list);
        row
    }

    #[test]
    fn empty_selection_places_no_restriction() {
        let filter = RowFilter::new(TableKind::ObjectParameterValue);
        assert!(filter.accepts(&object_row(1, 10, "salt")));
    }

    #[test]
    fn owner_selection_restricts_rows() {
        let mut filter = RowFilter::new(TableKind::ObjectParameterValue);
        assert!(filter.set_selection(
            BTreeSet::new(),
            BTreeSet::from([1]),
            BTreeSet::new()
        ));
        assert!(filter.accepts(&object_row(1, 10, "salt")));
        assert!(!filter.accepts(&object_row(2, 10, "salt")));
    }

    #[test]
    fn unchanged_selection_reports_no_invalidation() {
        let mut filter = RowFilter::new(TableKind::ObjectParameterValue);
        let ids = BTreeSet::from([1, 2]);
        assert!(filter.set_selection(ids.clone(), BTreeSet::new(), BTreeSet::new()));
        assert!(!filter.set_selection(ids, BTreeSet::new(), BTreeSet::new()));
    }

    #[test]
    fn member_intersection_matches_relationship_rows() {
        let mut filter = RowFilter::new(TableKind::RelationshipParameterValue);
        filter.set_selection(BTreeSet::new(), BTreeSet::from([2]), BTreeSet::new());
        assert!(filter.accepts(&relationship_row("2,1")));
        assert!(!filter.accepts(&relationship_row("1,3")));
    }

    #[test]
    fn exact_list_selection_wins_over_member_selection() {
        let mut filter = RowFilter::new(TableKind::RelationshipParameterValue);
        filter.set_selection(
            BTreeSet::new(),
            BTreeSet::from([2]),
            BTreeSet::from(["1,3".to_owned()]),
        );
        assert!(filter.accepts(&relationship_row("1,3")));
        assert!(!filter.accepts(&relationship_row("2,1")));
    }

    #[test]
    fn excluded_values_hide_rows_except_when_ignored() {
        let mut filter = RowFilter::new(TableKind::ObjectParameterValue);
        filter.set_filtered_out(
            object_value::VALUE,
            BTreeSet::from([Cell::text("salt")]),
        );

        let row = object_row(1, 10, "salt");
        assert!(!filter.accepts(&row));
        assert!(filter.auto_filter_accepts(&row, Some(object_value::VALUE)));
    }

    #[test]
    fn active_column_tracking() {
        let mut filter = RowFilter::new(TableKind::ObjectParameterValue);
        assert!(!filter.is_active_column(object_value::VALUE));

        filter.set_filtered_out(object_value::VALUE, BTreeSet::from([Cell::text("x")]));
        assert!(filter.is_active_column(object_value::VALUE));

        filter.set_selection(BTreeSet::from([10]), BTreeSet::new(), BTreeSet::new());
        assert!(filter.is_active_column(object_value::PARAMETER_ID));
        assert!(!filter.is_active_column(object_value::OBJECT_ID));
    }

    #[test]
    fn visible_rows_keep_table_order() {
        let mut filter = RowFilter::new(TableKind::ObjectParameterValue);
        filter.set_selection(BTreeSet::new(), BTreeSet::from([1, 3]), BTreeSet::new());
        let rows = vec![
            object_row(1, 10, "a"),
            object_row(2, 10, "b"),
            object_row(3, 10, "c"),
        ];
        assert_eq!(filter.visible_rows(&rows), vec![0, 2]);
    }
}
