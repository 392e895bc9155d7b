// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tabula_model::{
    Cell, ChangeEvent, ClassRef, EntityObject, Header, ObjectClass, ParameterDefinition,
    ParameterTag, ParameterTagId, ParameterValue, ParameterValueList, Relationship,
    RelationshipClass, TableKind, ValueListId, object_definition, object_value,
    relationship_definition, relationship_value,
};

use crate::backend::Backend;
use crate::commit::{
    EditReport, Resolver, match_added_definitions, match_added_values, plan_definition_updates,
    plan_value_updates, resolve_staged_rows, split_id_cells,
};
use crate::filter::RowFilter;
use crate::staging::StagingTable;
use crate::table::{BackingTable, CellEdit};

/// One backing table paired with its visibility filter. The visible-row
/// cache is recomputed eagerly whenever the filter or a filter-relevant
/// column changes, so reads stay borrow-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTable {
    rows: BackingTable,
    filter: RowFilter,
    visible: Vec<usize>,
}

impl SubTable {
    fn new(kind: TableKind) -> Self {
        Self {
            rows: BackingTable::new(kind.header()),
            filter: RowFilter::new(kind),
            visible: Vec::new(),
        }
    }

    fn with_rows(kind: TableKind, rows: Vec<Vec<Cell>>) -> Self {
        let mut sub = Self {
            rows: BackingTable::with_rows(kind.header(), rows),
            filter: RowFilter::new(kind),
            visible: Vec::new(),
        };
        sub.refresh();
        sub
    }

    fn refresh(&mut self) {
        self.visible = self.filter.visible_rows(self.rows.rows());
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Map a filtered row index to the backing table's source index.
    pub fn to_source(&self, filtered: usize) -> Option<usize> {
        self.visible.get(filtered).copied()
    }

    pub fn backing(&self) -> &BackingTable {
        &self.rows
    }

    pub fn filter(&self) -> &RowFilter {
        &self.filter
    }
}

/// Where a global row index lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Backing { class_id: i64, source_row: usize },
    Staging { row: usize },
}

/// Per-class selection sets pushed down to every sub-table filter.
/// Missing entries mean no restriction for that class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    pub definition_ids: BTreeMap<i64, BTreeSet<i64>>,
    pub owner_ids: BTreeMap<i64, BTreeSet<i64>>,
    pub owner_id_lists: BTreeMap<i64, BTreeSet<String>>,
}

/// One candidate value for a column's filter picker: whether it is
/// currently checked (not filtered out), the value, and the classes it
/// occurs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetValue {
    pub checked: bool,
    pub value: Cell,
    pub class_ids: BTreeSet<i64>,
}

/// The federated table: an ordered collection of per-class backing
/// tables behind one contiguous row index space, with the staging table
/// appended last. Staging is never hidden; a row index past every
/// visible backing row resolves into it, and an index past everything is
/// rejected.
#[derive(Debug)]
pub struct CompositeTable {
    kind: TableKind,
    header: Header,
    sub_tables: BTreeMap<i64, SubTable>,
    staging: StagingTable,
    visible_classes: BTreeSet<i64>,
    filtered_out: BTreeMap<usize, BTreeSet<Cell>>,
    // Member object-class ids per relationship class, for cascading
    // object-class removal into relationship sub-tables.
    member_class_lists: BTreeMap<i64, Vec<i64>>,
}

impl CompositeTable {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            header: kind.header(),
            sub_tables: BTreeMap::new(),
            staging: StagingTable::new(kind.header()),
            visible_classes: BTreeSet::new(),
            filtered_out: BTreeMap::new(),
            member_class_lists: BTreeMap::new(),
        }
    }

    /// (Re)load the full table set from the store, one sub-table per
    /// class present in the data.
    pub fn reset_from_backend(&mut self, backend: &dyn Backend) -> Result<()> {
        let class_column = self.kind.class_id_column();
        let mut grouped: BTreeMap<i64, Vec<Vec<Cell>>> = BTreeMap::new();
        for row in backend.table_rows(self.kind)? {
            let Some(class_id) = row.get(class_column).and_then(Cell::as_id) else {
                continue;
            };
            grouped.entry(class_id).or_default().push(row);
        }
        let kind = self.kind;
        self.sub_tables = grouped
            .into_iter()
            .map(|(class_id, rows)| (class_id, SubTable::with_rows(kind, rows)))
            .collect();
        self.member_class_lists.clear();
        if self.kind.is_relationship() {
            for class in backend.relationship_class_list()? {
                self.member_class_lists.insert(
                    class.id.get(),
                    class.object_class_ids.iter().map(|id| id.get()).collect(),
                );
            }
        }
        self.staging = StagingTable::new(self.header);
        self.filtered_out.clear();
        Ok(())
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn header_at(&self, column: usize) -> Option<&'static str> {
        self.header.name_of(column)
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn row_count(&self) -> usize {
        let backing: usize = self
            .visible_sub_tables()
            .map(|(_, sub)| sub.visible_count())
            .sum();
        backing + self.staging.row_count()
    }

    pub fn staging(&self) -> &StagingTable {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingTable {
        &mut self.staging
    }

    pub fn sub_table(&self, class_id: i64) -> Option<&SubTable> {
        self.sub_tables.get(&class_id)
    }

    pub fn class_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.sub_tables.keys().copied()
    }

    /// Restrict routing to the given classes; an empty set restores the
    /// unrestricted view.
    pub fn set_visible_classes(&mut self, classes: BTreeSet<i64>) {
        self.visible_classes = classes;
    }

    fn class_visible(&self, class_id: i64) -> bool {
        self.visible_classes.is_empty() || self.visible_classes.contains(&class_id)
    }

    fn visible_sub_tables(&self) -> impl Iterator<Item = (i64, &SubTable)> {
        self.sub_tables
            .iter()
            .filter(|(class_id, _)| self.class_visible(**class_id))
            .map(|(class_id, sub)| (*class_id, sub))
    }

    /// Resolve a global row index to its constituent. Indexes past the
    /// staging table are invalid.
    pub fn resolve(&self, global: usize) -> Option<Location> {
        let mut remaining = global;
        for (class_id, sub) in self.visible_sub_tables() {
            let count = sub.visible_count();
            if remaining < count {
                let source_row = sub.to_source(remaining)?;
                return Some(Location::Backing {
                    class_id,
                    source_row,
                });
            }
            remaining -= count;
        }
        if remaining < self.staging.row_count() {
            Some(Location::Staging { row: remaining })
        } else {
            None
        }
    }

    pub fn value_at(&self, row: usize, column: usize) -> Option<&Cell> {
        match self.resolve(row)? {
            Location::Backing {
                class_id,
                source_row,
            } => self.sub_tables.get(&class_id)?.rows.value_at(source_row, column),
            Location::Staging { row } => self.staging.value_at(row, column),
        }
    }

    /// Push per-class selections down to every sub-table filter; any
    /// selection change also clears the auto filters, matching how
    /// filter pickers are rebuilt after a selection change.
    pub fn update_selection(&mut self, selection: &SelectionFilter) {
        for (class_id, sub) in &mut self.sub_tables {
            let changed = sub.filter.set_selection(
                selection
                    .definition_ids
                    .get(class_id)
                    .cloned()
                    .unwrap_or_default(),
                selection.owner_ids.get(class_id).cloned().unwrap_or_default(),
                selection
                    .owner_id_lists
                    .get(class_id)
                    .cloned()
                    .unwrap_or_default(),
            );
            let cleared = sub.filter.clear_filtered_out();
            if changed || cleared {
                sub.refresh();
            }
        }
        self.filtered_out.clear();
    }

    /// Candidate values for a column's filter picker. A column's own
    /// exclusions are ignored while collecting so already-excluded
    /// values stay offered (unchecked).
    pub fn auto_filter_values(&self, column: usize) -> Vec<FacetValue> {
        let mut values: BTreeMap<Cell, BTreeSet<i64>> = BTreeMap::new();
        for (class_id, sub) in self.visible_sub_tables() {
            for row in sub.rows.rows() {
                if !sub.filter.main_accepts(row) {
                    continue;
                }
                if !sub.filter.auto_filter_accepts(row, Some(column)) {
                    continue;
                }
                let Some(cell) = row.get(column) else {
                    continue;
                };
                values.entry(cell.clone()).or_default().insert(class_id);
            }
        }
        let excluded = self.filtered_out.get(&column);
        values
            .into_iter()
            .map(|(value, class_ids)| FacetValue {
                checked: !excluded.is_some_and(|set| set.contains(&value)),
                value,
                class_ids,
            })
            .collect()
    }

    /// Replace one column's excluded values, given per class.
    pub fn set_filtered_out_values(
        &mut self,
        column: usize,
        per_class: &BTreeMap<i64, BTreeSet<Cell>>,
    ) {
        let union: BTreeSet<Cell> = per_class.values().flatten().cloned().collect();
        if union.is_empty() {
            self.filtered_out.remove(&column);
        } else {
            self.filtered_out.insert(column, union);
        }
        for (class_id, sub) in &mut self.sub_tables {
            let values = per_class.get(class_id).cloned().unwrap_or_default();
            if sub.filter.set_filtered_out(column, values) {
                sub.refresh();
            }
        }
    }

    pub fn clear_filters(&mut self) {
        self.filtered_out.clear();
        for sub in self.sub_tables.values_mut() {
            if sub.filter.clear_filtered_out() {
                sub.refresh();
            }
        }
    }

    pub fn filtered_out_values(&self, column: usize) -> Option<&BTreeSet<Cell>> {
        self.filtered_out.get(&column)
    }

    /// Insert blank rows at a global position; the constituent owning
    /// the position receives them.
    pub fn insert_rows(&mut self, row: usize, count: usize) -> bool {
        if count < 1 {
            return false;
        }
        let mut remaining = row;
        let mut target = None;
        for (class_id, sub) in self.visible_sub_tables() {
            let visible = sub.visible_count();
            if remaining < visible {
                target = Some((class_id, sub.to_source(remaining)));
                break;
            }
            remaining -= visible;
        }
        match target {
            Some((class_id, Some(source_row))) => {
                let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                    return false;
                };
                let inserted = sub.rows.insert_rows(source_row, count);
                if inserted {
                    sub.refresh();
                }
                inserted
            }
            Some((_, None)) => false,
            None => self.staging.insert_rows(remaining, count),
        }
    }

    /// Remove a contiguous global range, partitioning it across the
    /// constituents it spans.
    pub fn remove_rows(&mut self, row: usize, count: usize) -> bool {
        if count < 1 || row.checked_add(count).is_none_or(|end| end > self.row_count()) {
            return false;
        }
        let mut backing: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        let mut staging_rows: Vec<usize> = Vec::new();
        for global in row..row + count {
            match self.resolve(global) {
                Some(Location::Backing {
                    class_id,
                    source_row,
                }) => backing.entry(class_id).or_default().push(source_row),
                Some(Location::Staging { row }) => staging_rows.push(row),
                None => return false,
            }
        }
        for (class_id, mut source_rows) in backing {
            let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                continue;
            };
            source_rows.sort_unstable();
            for source_row in source_rows.into_iter().rev() {
                sub.rows.remove_rows(source_row, 1);
            }
            sub.refresh();
        }
        if let (Some(first), Some(last)) = (staging_rows.first(), staging_rows.last()) {
            self.staging.remove_rows(*first, last - first + 1);
        }
        true
    }

    /// Batch write addressed by global rows: committed-row edits are
    /// diffed and sent to the store per class, staging edits are written
    /// optimistically and then committed, and rows the store accepts are
    /// promoted into their class's backing table.
    pub fn set_values(&mut self, backend: &dyn Backend, edits: &[CellEdit]) -> Result<EditReport> {
        if edits.is_empty() {
            return Ok(EditReport::rejected());
        }
        let total = self.row_count();
        let structurally_valid = edits
            .iter()
            .all(|edit| edit.row < total && edit.column < self.header.len());
        if !structurally_valid {
            return Ok(EditReport::rejected());
        }

        let mut per_class: BTreeMap<i64, Vec<CellEdit>> = BTreeMap::new();
        let mut staging_edits: Vec<CellEdit> = Vec::new();
        for edit in edits {
            match self.resolve(edit.row) {
                Some(Location::Backing {
                    class_id,
                    source_row,
                }) => per_class
                    .entry(class_id)
                    .or_default()
                    .push(CellEdit::new(source_row, edit.column, edit.value.clone())),
                Some(Location::Staging { row }) => {
                    staging_edits.push(CellEdit::new(row, edit.column, edit.value.clone()));
                }
                None => return Ok(EditReport::rejected()),
            }
        }

        let needs_resolver =
            !staging_edits.is_empty() || (!self.kind.is_value() && !per_class.is_empty());
        let resolver = if needs_resolver {
            Some(Resolver::load(backend, self.kind)?)
        } else {
            None
        };

        let mut report = EditReport::accepted();
        for (class_id, class_edits) in per_class {
            self.commit_backing_edits(backend, class_id, &class_edits, resolver.as_ref(), &mut report)?;
        }
        if !staging_edits.is_empty()
            && let Some(resolver) = resolver.as_ref()
        {
            self.commit_staging_edits(backend, &staging_edits, resolver, &mut report)?;
        }
        Ok(report)
    }

    fn commit_backing_edits(
        &mut self,
        backend: &dyn Backend,
        class_id: i64,
        edits: &[CellEdit],
        resolver: Option<&Resolver>,
        report: &mut EditReport,
    ) -> Result<()> {
        let Some(sub) = self.sub_tables.get_mut(&class_id) else {
            return Ok(());
        };
        let id_column = self.kind.id_column();
        if self.kind.is_value() {
            let plan = plan_value_updates(self.kind, &sub.rows, edits);
            report.errors.extend(plan.errors);
            if plan.payloads.is_empty() {
                return Ok(());
            }
            let outcome = backend.update_parameter_values(&plan.payloads)?;
            report.errors.extend(outcome.errors);
            let succeeded: BTreeSet<i64> = outcome.items.iter().map(|item| item.id.get()).collect();
            report.updated += succeeded.len();
            let mut touched_active_column = false;
            for edit in &plan.apply {
                let row_id = sub.rows.value_at(edit.row, id_column).and_then(Cell::as_id);
                if row_id.is_some_and(|id| succeeded.contains(&id)) {
                    sub.rows.set_value(edit.row, edit.column, edit.value.clone());
                    touched_active_column |= sub.filter.is_active_column(edit.column);
                }
            }
            if touched_active_column {
                sub.refresh();
            }
        } else {
            let Some(resolver) = resolver else {
                return Ok(());
            };
            let plan = plan_definition_updates(self.kind, &sub.rows, edits, resolver);
            report.errors.extend(plan.errors);
            if plan.payloads.is_empty() {
                return Ok(());
            }
            let outcome = backend.update_parameter_definitions(&plan.payloads)?;
            report.errors.extend(outcome.errors);
            let succeeded: BTreeSet<i64> = outcome.items.iter().map(|item| item.id.get()).collect();
            report.updated += succeeded.len();
            let mut touched_active_column = false;
            for edit in plan.apply.iter().chain(plan.backfill.iter()) {
                let row_id = sub.rows.value_at(edit.row, id_column).and_then(Cell::as_id);
                if row_id.is_some_and(|id| succeeded.contains(&id)) {
                    sub.rows.set_value(edit.row, edit.column, edit.value.clone());
                    touched_active_column |= sub.filter.is_active_column(edit.column);
                }
            }
            if touched_active_column {
                sub.refresh();
            }
        }
        Ok(())
    }

    fn commit_staging_edits(
        &mut self,
        backend: &dyn Backend,
        edits: &[CellEdit],
        resolver: &Resolver,
        report: &mut EditReport,
    ) -> Result<()> {
        if self.staging.set_values(edits).is_none() {
            report.accepted = false;
            return Ok(());
        }
        let touched: BTreeSet<usize> = edits.iter().map(|edit| edit.row).collect();
        let staged =
            resolve_staged_rows(self.kind, &mut self.staging, &touched, resolver, backend)?;
        report.errors.extend(staged.errors);
        let id_column = self.kind.id_column();

        if self.kind.is_value() {
            if staged.value_items.is_empty() {
                return Ok(());
            }
            let items: Vec<_> = staged
                .value_items
                .iter()
                .map(|(_, item)| item.clone())
                .collect();
            let outcome = backend.add_parameter_values(&items)?;
            report.errors.extend(outcome.errors);
            let matched = match_added_values(&staged.value_items, &outcome.items);
            let mut promoted = Vec::with_capacity(matched.len());
            for (row, record) in matched {
                self.staging
                    .set_value(row, id_column, Cell::Id(record.id.get()));
                promoted.push(row);
            }
            report.added += promoted.len();
            self.promote(&promoted);
        } else {
            if staged.definition_items.is_empty() {
                return Ok(());
            }
            let items: Vec<_> = staged
                .definition_items
                .iter()
                .map(|(_, item)| item.clone())
                .collect();
            let outcome = backend.add_parameter_definitions(&items)?;
            report.errors.extend(outcome.errors);
            let matched = match_added_definitions(&staged.definition_items, &outcome.items);
            let mut promoted = Vec::with_capacity(matched.len());
            for (row, record) in matched {
                self.staging
                    .set_value(row, id_column, Cell::Id(record.id.get()));
                promoted.push(row);
            }
            report.added += promoted.len();
            self.promote(&promoted);
        }
        Ok(())
    }

    /// Move committed staging rows into their class's backing table,
    /// creating the table when this is the class's first committed row.
    fn promote(&mut self, rows: &[usize]) {
        if rows.is_empty() {
            return;
        }
        let class_column = self.kind.class_id_column();
        let taken = self.staging.take_rows(rows);
        let mut grouped: BTreeMap<i64, Vec<Vec<Cell>>> = BTreeMap::new();
        for row in taken {
            let Some(class_id) = row.get(class_column).and_then(Cell::as_id) else {
                continue;
            };
            grouped.entry(class_id).or_default().push(row);
        }
        for (class_id, class_rows) in grouped {
            self.append_rows(class_id, class_rows);
        }
    }

    fn append_rows(&mut self, class_id: i64, rows: Vec<Vec<Cell>>) {
        if self.kind.is_relationship()
            && !self.member_class_lists.contains_key(&class_id)
            && let Some(first) = rows.first()
        {
            let list_column = match self.kind {
                TableKind::RelationshipParameterValue => relationship_value::OBJECT_CLASS_ID_LIST,
                _ => relationship_definition::OBJECT_CLASS_ID_LIST,
            };
            if let Some(cell) = first.get(list_column) {
                self.member_class_lists
                    .insert(class_id, split_id_cells(cell));
            }
        }
        let kind = self.kind;
        let sub = self
            .sub_tables
            .entry(class_id)
            .or_insert_with(|| SubTable::new(kind));
        for row in rows {
            sub.rows.push_row(row);
        }
        sub.refresh();
    }

    /// Apply one store change notification. Missing tables or rows are
    /// no-ops; a notification can race a local edit and arrive late.
    pub fn apply_event(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::ObjectClassesAdded(_)
            | ChangeEvent::ObjectsAdded(_)
            | ChangeEvent::RelationshipsAdded(_) => {}
            ChangeEvent::ObjectClassesUpdated(classes) => self.rename_object_classes(classes),
            ChangeEvent::ObjectClassesRemoved(classes) => self.remove_object_classes(classes),
            ChangeEvent::ObjectsUpdated(objects) => self.rename_objects(objects),
            ChangeEvent::ObjectsRemoved(objects) => self.remove_objects(objects),
            ChangeEvent::RelationshipClassesAdded(classes) => {
                self.register_relationship_classes(classes);
            }
            ChangeEvent::RelationshipClassesUpdated(classes) => {
                self.register_relationship_classes(classes);
                self.rename_relationship_classes(classes);
            }
            ChangeEvent::RelationshipClassesRemoved(classes) => {
                self.remove_relationship_classes(classes);
            }
            ChangeEvent::RelationshipsRemoved(relationships) => {
                self.remove_relationships(relationships);
            }
            ChangeEvent::ParameterDefinitionsUpdated(definitions) => {
                self.rename_definitions(definitions);
            }
            ChangeEvent::ParameterDefinitionsRemoved(definitions) => {
                self.remove_definitions(definitions);
            }
            ChangeEvent::ParameterValuesRemoved(values) => self.remove_values(values),
            ChangeEvent::ParameterTagsUpdated(tags) => self.rename_tags(tags),
            ChangeEvent::ParameterTagsRemoved(tag_ids) => self.remove_tags(tag_ids),
            ChangeEvent::ValueListsUpdated(value_lists) => self.rename_value_lists(value_lists),
            ChangeEvent::ValueListsRemoved(list_ids) => self.remove_value_lists(list_ids),
            ChangeEvent::TableRowsAdded { kind, rows } => {
                if *kind == self.kind {
                    self.add_table_rows(rows);
                }
            }
        }
    }

    fn add_table_rows(&mut self, rows: &[Vec<Cell>]) {
        let class_column = self.kind.class_id_column();
        let mut grouped: BTreeMap<i64, Vec<Vec<Cell>>> = BTreeMap::new();
        for row in rows {
            let Some(class_id) = row.get(class_column).and_then(Cell::as_id) else {
                continue;
            };
            grouped.entry(class_id).or_default().push(row.clone());
        }
        for (class_id, class_rows) in grouped {
            self.append_rows(class_id, class_rows);
        }
    }

    fn register_relationship_classes(&mut self, classes: &[RelationshipClass]) {
        if !self.kind.is_relationship() {
            return;
        }
        for class in classes {
            self.member_class_lists.insert(
                class.id.get(),
                class.object_class_ids.iter().map(|id| id.get()).collect(),
            );
        }
    }

    fn rename_object_classes(&mut self, classes: &[ObjectClass]) {
        if self.kind.is_relationship() {
            // Positional rewrite: only member slots whose class id
            // matches a renamed class change.
            let renamed: BTreeMap<i64, &str> = classes
                .iter()
                .map(|class| (class.id.get(), class.name.as_str()))
                .collect();
            let (id_list_column, name_list_column) = match self.kind {
                TableKind::RelationshipParameterValue => (
                    relationship_value::OBJECT_CLASS_ID_LIST,
                    relationship_value::OBJECT_CLASS_NAME_LIST,
                ),
                _ => (
                    relationship_definition::OBJECT_CLASS_ID_LIST,
                    relationship_definition::OBJECT_CLASS_NAME_LIST,
                ),
            };
            for sub in self.sub_tables.values_mut() {
                rewrite_list_positions(&mut sub.rows, id_list_column, name_list_column, &renamed);
            }
            return;
        }
        let name_column = self.kind.class_name_column();
        for class in classes {
            let Some(sub) = self.sub_tables.get_mut(&class.id.get()) else {
                continue;
            };
            for row in sub.rows.rows_mut() {
                row[name_column] = Cell::text(&class.name);
            }
            if sub.filter.is_active_column(name_column) {
                sub.refresh();
            }
        }
    }

    fn rename_relationship_classes(&mut self, classes: &[RelationshipClass]) {
        if !self.kind.is_relationship() {
            return;
        }
        let name_column = self.kind.class_name_column();
        for class in classes {
            let Some(sub) = self.sub_tables.get_mut(&class.id.get()) else {
                continue;
            };
            for row in sub.rows.rows_mut() {
                row[name_column] = Cell::text(&class.name);
            }
        }
    }

    fn rename_objects(&mut self, objects: &[EntityObject]) {
        match self.kind {
            TableKind::ObjectParameterValue => {
                let mut per_class: BTreeMap<i64, BTreeMap<i64, &str>> = BTreeMap::new();
                for object in objects {
                    per_class
                        .entry(object.class_id.get())
                        .or_default()
                        .insert(object.id.get(), object.name.as_str());
                }
                for (class_id, renamed) in per_class {
                    let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                        continue;
                    };
                    for row in sub.rows.rows_mut() {
                        let Some(object_id) = row[object_value::OBJECT_ID].as_id() else {
                            continue;
                        };
                        if let Some(name) = renamed.get(&object_id) {
                            row[object_value::OBJECT_NAME] = Cell::text(*name);
                        }
                    }
                }
            }
            TableKind::RelationshipParameterValue => {
                let renamed: BTreeMap<i64, &str> = objects
                    .iter()
                    .map(|object| (object.id.get(), object.name.as_str()))
                    .collect();
                for sub in self.sub_tables.values_mut() {
                    rewrite_list_positions(
                        &mut sub.rows,
                        relationship_value::OBJECT_ID_LIST,
                        relationship_value::OBJECT_NAME_LIST,
                        &renamed,
                    );
                }
            }
            TableKind::ObjectParameterDefinition | TableKind::RelationshipParameterDefinition => {}
        }
    }

    fn rename_definitions(&mut self, definitions: &[ParameterDefinition]) {
        for definition in definitions {
            let scope_matches = match definition.class {
                ClassRef::Object(_) => !self.kind.is_relationship(),
                ClassRef::Relationship(_) => self.kind.is_relationship(),
            };
            if !scope_matches {
                continue;
            }
            let Some(sub) = self.sub_tables.get_mut(&definition.class.raw_id()) else {
                continue;
            };
            let (match_column, name_column) = match self.kind {
                TableKind::ObjectParameterValue => {
                    (object_value::PARAMETER_ID, object_value::PARAMETER_NAME)
                }
                TableKind::RelationshipParameterValue => (
                    relationship_value::PARAMETER_ID,
                    relationship_value::PARAMETER_NAME,
                ),
                TableKind::ObjectParameterDefinition => {
                    (object_definition::ID, object_definition::PARAMETER_NAME)
                }
                TableKind::RelationshipParameterDefinition => (
                    relationship_definition::ID,
                    relationship_definition::PARAMETER_NAME,
                ),
            };
            for row in sub.rows.rows_mut() {
                if row[match_column].as_id() == Some(definition.id.get()) {
                    row[name_column] = Cell::text(&definition.name);
                }
            }
        }
    }

    fn rename_tags(&mut self, tags: &[ParameterTag]) {
        let Some((id_list_column, name_list_column)) = self.tag_columns() else {
            return;
        };
        let renamed: BTreeMap<i64, &str> = tags
            .iter()
            .map(|tag| (tag.id.get(), tag.tag.as_str()))
            .collect();
        for sub in self.sub_tables.values_mut() {
            rewrite_list_positions(&mut sub.rows, id_list_column, name_list_column, &renamed);
        }
    }

    fn remove_tags(&mut self, tag_ids: &[ParameterTagId]) {
        let Some((id_list_column, name_list_column)) = self.tag_columns() else {
            return;
        };
        let removed: BTreeSet<i64> = tag_ids.iter().map(|id| id.get()).collect();
        for sub in self.sub_tables.values_mut() {
            for row in sub.rows.rows_mut() {
                let ids = split_id_cells(&row[id_list_column]);
                if ids.is_empty() || !ids.iter().any(|id| removed.contains(id)) {
                    continue;
                }
                let names: Vec<&str> = match row[name_list_column].as_text() {
                    Some(text) => text.split(',').collect(),
                    None => Vec::new(),
                };
                let mut kept_ids = Vec::new();
                let mut kept_names = Vec::new();
                for (position, id) in ids.iter().enumerate() {
                    if removed.contains(id) {
                        continue;
                    }
                    kept_ids.push(id.to_string());
                    if let Some(name) = names.get(position) {
                        kept_names.push((*name).to_owned());
                    }
                }
                row[id_list_column] = Cell::list(&kept_ids.join(","));
                row[name_list_column] = Cell::list(&kept_names.join(","));
            }
        }
    }

    const fn tag_columns(&self) -> Option<(usize, usize)> {
        match self.kind {
            TableKind::ObjectParameterDefinition => Some((
                object_definition::PARAMETER_TAG_ID_LIST,
                object_definition::PARAMETER_TAG_LIST,
            )),
            TableKind::RelationshipParameterDefinition => Some((
                relationship_definition::PARAMETER_TAG_ID_LIST,
                relationship_definition::PARAMETER_TAG_LIST,
            )),
            TableKind::ObjectParameterValue | TableKind::RelationshipParameterValue => None,
        }
    }

    const fn value_list_columns(&self) -> Option<(usize, usize)> {
        match self.kind {
            TableKind::ObjectParameterDefinition => Some((
                object_definition::VALUE_LIST_ID,
                object_definition::VALUE_LIST_NAME,
            )),
            TableKind::RelationshipParameterDefinition => Some((
                relationship_definition::VALUE_LIST_ID,
                relationship_definition::VALUE_LIST_NAME,
            )),
            TableKind::ObjectParameterValue | TableKind::RelationshipParameterValue => None,
        }
    }

    fn rename_value_lists(&mut self, value_lists: &[ParameterValueList]) {
        let Some((id_column, name_column)) = self.value_list_columns() else {
            return;
        };
        let renamed: BTreeMap<i64, &str> = value_lists
            .iter()
            .map(|list| (list.id.get(), list.name.as_str()))
            .collect();
        for sub in self.sub_tables.values_mut() {
            for row in sub.rows.rows_mut() {
                let Some(list_id) = row[id_column].as_id() else {
                    continue;
                };
                if let Some(name) = renamed.get(&list_id) {
                    row[name_column] = Cell::text(*name);
                }
            }
        }
    }

    fn remove_value_lists(&mut self, list_ids: &[ValueListId]) {
        let Some((id_column, name_column)) = self.value_list_columns() else {
            return;
        };
        let removed: BTreeSet<i64> = list_ids.iter().map(|id| id.get()).collect();
        for sub in self.sub_tables.values_mut() {
            for row in sub.rows.rows_mut() {
                let Some(list_id) = row[id_column].as_id() else {
                    continue;
                };
                if removed.contains(&list_id) {
                    row[id_column] = Cell::Empty;
                    row[name_column] = Cell::Empty;
                }
            }
        }
    }

    fn remove_object_classes(&mut self, classes: &[ObjectClass]) {
        let removed: BTreeSet<i64> = classes.iter().map(|class| class.id.get()).collect();
        if self.kind.is_relationship() {
            // A relationship class dies with any of its member classes.
            let doomed: Vec<i64> = self
                .member_class_lists
                .iter()
                .filter(|(_, members)| members.iter().any(|id| removed.contains(id)))
                .map(|(class_id, _)| *class_id)
                .collect();
            for class_id in doomed {
                self.sub_tables.remove(&class_id);
                self.member_class_lists.remove(&class_id);
            }
            return;
        }
        for class_id in removed {
            self.sub_tables.remove(&class_id);
        }
    }

    fn remove_relationship_classes(&mut self, classes: &[RelationshipClass]) {
        if !self.kind.is_relationship() {
            return;
        }
        for class in classes {
            self.sub_tables.remove(&class.id.get());
            self.member_class_lists.remove(&class.id.get());
        }
    }

    fn remove_objects(&mut self, objects: &[EntityObject]) {
        match self.kind {
            TableKind::ObjectParameterValue => {
                let mut per_class: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
                for object in objects {
                    per_class
                        .entry(object.class_id.get())
                        .or_default()
                        .insert(object.id.get());
                }
                for (class_id, object_ids) in per_class {
                    let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                        continue;
                    };
                    let removed = sub.rows.retain_rows(|row| {
                        row[object_value::OBJECT_ID]
                            .as_id()
                            .is_none_or(|id| !object_ids.contains(&id))
                    });
                    if removed > 0 {
                        sub.refresh();
                    }
                }
            }
            TableKind::RelationshipParameterValue => {
                let removed_ids: BTreeSet<i64> =
                    objects.iter().map(|object| object.id.get()).collect();
                for sub in self.sub_tables.values_mut() {
                    let removed = sub.rows.retain_rows(|row| {
                        !split_id_cells(&row[relationship_value::OBJECT_ID_LIST])
                            .iter()
                            .any(|id| removed_ids.contains(id))
                    });
                    if removed > 0 {
                        sub.refresh();
                    }
                }
            }
            TableKind::ObjectParameterDefinition | TableKind::RelationshipParameterDefinition => {}
        }
    }

    fn remove_relationships(&mut self, relationships: &[Relationship]) {
        if self.kind != TableKind::RelationshipParameterValue {
            return;
        }
        let mut per_class: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for relationship in relationships {
            per_class
                .entry(relationship.class_id.get())
                .or_default()
                .insert(relationship.id.get());
        }
        for (class_id, relationship_ids) in per_class {
            let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                continue;
            };
            let removed = sub.rows.retain_rows(|row| {
                row[relationship_value::RELATIONSHIP_ID]
                    .as_id()
                    .is_none_or(|id| !relationship_ids.contains(&id))
            });
            if removed > 0 {
                sub.refresh();
            }
        }
    }

    fn remove_definitions(&mut self, definitions: &[ParameterDefinition]) {
        let match_column = match self.kind {
            TableKind::ObjectParameterValue => object_value::PARAMETER_ID,
            TableKind::RelationshipParameterValue => relationship_value::PARAMETER_ID,
            TableKind::ObjectParameterDefinition | TableKind::RelationshipParameterDefinition => {
                self.kind.id_column()
            }
        };
        let mut per_class: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for definition in definitions {
            let scope_matches = match definition.class {
                ClassRef::Object(_) => !self.kind.is_relationship(),
                ClassRef::Relationship(_) => self.kind.is_relationship(),
            };
            if scope_matches {
                per_class
                    .entry(definition.class.raw_id())
                    .or_default()
                    .insert(definition.id.get());
            }
        }
        for (class_id, definition_ids) in per_class {
            let Some(sub) = self.sub_tables.get_mut(&class_id) else {
                continue;
            };
            let removed = sub.rows.retain_rows(|row| {
                row[match_column]
                    .as_id()
                    .is_none_or(|id| !definition_ids.contains(&id))
            });
            if removed > 0 {
                sub.refresh();
            }
        }
    }

    fn remove_values(&mut self, values: &[ParameterValue]) {
        if !self.kind.is_value() {
            return;
        }
        let removed_ids: BTreeSet<i64> = values.iter().map(|value| value.id.get()).collect();
        let id_column = self.kind.id_column();
        for sub in self.sub_tables.values_mut() {
            let removed = sub.rows.retain_rows(|row| {
                row[id_column]
                    .as_id()
                    .is_none_or(|id| !removed_ids.contains(&id))
            });
            if removed > 0 {
                sub.refresh();
            }
        }
    }
}

/// Rewrite positions of a comma-joined display list wherever the
/// parallel id list references a changed id.
fn rewrite_list_positions(
    table: &mut BackingTable,
    id_list_column: usize,
    name_list_column: usize,
    renamed: &BTreeMap<i64, &str>,
) {
    for row in table.rows_mut() {
        let ids = split_id_cells(&row[id_list_column]);
        if ids.is_empty() {
            continue;
        }
        let Some(text) = row[name_list_column].as_text() else {
            continue;
        };
        let mut names: Vec<String> = text.split(',').map(str::to_owned).collect();
        let mut changed = false;
        for (position, id) in ids.iter().enumerate() {
            if let Some(new_name) = renamed.get(id)
                && let Some(slot) = names.get_mut(position)
            {
                *slot = (*new_name).to_owned();
                changed = true;
            }
        }
        if changed {
            row[name_list_column] = Cell::text(names.join(","));
        }
    }
}
