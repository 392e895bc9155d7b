// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tabula_model::{
    Cell, ClassRef, ObjectClassId, ObjectId, OwnerRef, ParameterDefinition, ParameterDefinitionId,
    ParameterTagId, ParameterValue, RelationshipClass, RelationshipId, TableKind, ValueListId,
    join_ids, object_definition, object_value, relationship_definition, relationship_value,
    split_ids,
};

use crate::backend::{
    Backend, NewParameterDefinition, NewParameterValue, NewRelationship,
    ParameterDefinitionUpdate, ParameterValueUpdate,
};
use crate::staging::StagingTable;
use crate::table::{BackingTable, CellEdit};

/// Outcome of one batch edit: whether the write was structurally
/// accepted, how many rows the store created and updated, and the
/// aggregated error log. Success and failure are independent so one
/// batch can report both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    pub accepted: bool,
    pub added: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl EditReport {
    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn accepted() -> Self {
        Self {
            accepted: true,
            ..Self::default()
        }
    }
}

/// Lookup maps for resolving human-readable names in staged rows to
/// store ids, built from the backend's current listings once per batch.
pub(crate) struct Resolver {
    object_class_by_name: BTreeMap<String, ObjectClassId>,
    object_class_name_by_id: BTreeMap<i64, String>,
    object_by_name: BTreeMap<String, (ObjectId, ObjectClassId)>,
    relationship_class_by_name: BTreeMap<String, RelationshipClass>,
    relationship_class_by_id: BTreeMap<i64, RelationshipClass>,
    relationship_by_key: BTreeMap<(i64, String), RelationshipId>,
    definitions_by_name: BTreeMap<String, Vec<(ParameterDefinitionId, i64)>>,
    tag_by_name: BTreeMap<String, ParameterTagId>,
    value_list_by_name: BTreeMap<String, ValueListId>,
}

impl Resolver {
    pub(crate) fn load(backend: &dyn Backend, kind: TableKind) -> Result<Self> {
        let object_classes = backend.object_class_list()?;
        let object_class_by_name = object_classes
            .iter()
            .map(|class| (class.name.clone(), class.id))
            .collect();
        let object_class_name_by_id = object_classes
            .iter()
            .map(|class| (class.id.get(), class.name.clone()))
            .collect::<BTreeMap<_, _>>();

        let mut object_by_name = BTreeMap::new();
        for object in backend.object_list()? {
            object_by_name.insert(object.name.clone(), (object.id, object.class_id));
        }

        let mut relationship_class_by_name = BTreeMap::new();
        let mut relationship_class_by_id = BTreeMap::new();
        let mut relationship_by_key = BTreeMap::new();
        if kind.is_relationship() {
            for class in backend.relationship_class_list()? {
                relationship_class_by_id.insert(class.id.get(), class.clone());
                relationship_class_by_name.insert(class.name.clone(), class);
            }
            for relationship in backend.relationship_list()? {
                relationship_by_key.insert(
                    (relationship.class_id.get(), relationship.object_id_list()),
                    relationship.id,
                );
            }
        }

        let mut definitions_by_name: BTreeMap<String, Vec<(ParameterDefinitionId, i64)>> =
            BTreeMap::new();
        for definition in backend.parameter_definition_list()? {
            let scope_matches = match definition.class {
                ClassRef::Object(_) => !kind.is_relationship(),
                ClassRef::Relationship(_) => kind.is_relationship(),
            };
            if !scope_matches {
                continue;
            }
            definitions_by_name
                .entry(definition.name.clone())
                .or_default()
                .push((definition.id, definition.class.raw_id()));
        }

        let mut tag_by_name = BTreeMap::new();
        let mut value_list_by_name = BTreeMap::new();
        if !kind.is_value() {
            for tag in backend.parameter_tag_list()? {
                tag_by_name.insert(tag.tag.clone(), tag.id);
            }
            for value_list in backend.value_list_list()? {
                value_list_by_name.insert(value_list.name.clone(), value_list.id);
            }
        }

        Ok(Self {
            object_class_by_name,
            object_class_name_by_id,
            object_by_name,
            relationship_class_by_name,
            relationship_class_by_id,
            relationship_by_key,
            definitions_by_name,
            tag_by_name,
            value_list_by_name,
        })
    }

    fn object_class_name(&self, id: i64) -> Option<&str> {
        self.object_class_name_by_id.get(&id).map(String::as_str)
    }

    /// One unambiguous definition for a name: a single candidate wins
    /// outright, otherwise the candidate attached to the given class.
    fn definition_for(
        &self,
        name: &str,
        class_id: Option<i64>,
    ) -> Option<(ParameterDefinitionId, i64)> {
        let candidates = self.definitions_by_name.get(name)?;
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        class_id.and_then(|class_id| {
            candidates
                .iter()
                .find(|(_, candidate_class)| *candidate_class == class_id)
                .copied()
        })
    }

    fn class_name_list(&self, class: &RelationshipClass) -> String {
        class
            .object_class_ids
            .iter()
            .map(|id| self.object_class_name(id.get()).unwrap_or_default().to_owned())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Changed-cell payloads for committed value rows. Unchanged cells are
/// skipped entirely (no store call for a no-op edit); edits on fixed or
/// hidden columns are reported, not applied.
pub(crate) struct ValueUpdatePlan {
    pub payloads: Vec<ParameterValueUpdate>,
    pub apply: Vec<CellEdit>,
    pub errors: Vec<String>,
}

pub(crate) fn plan_value_updates(
    kind: TableKind,
    table: &BackingTable,
    edits: &[CellEdit],
) -> ValueUpdatePlan {
    let header = kind.header();
    let value_column = match kind {
        TableKind::ObjectParameterValue => object_value::VALUE,
        TableKind::RelationshipParameterValue => relationship_value::VALUE,
        _ => unreachable!("value update plan is only built for value kinds"),
    };
    let id_column = kind.id_column();
    let mut payloads: BTreeMap<i64, ParameterValueUpdate> = BTreeMap::new();
    let mut apply = Vec::new();
    let mut errors = Vec::new();
    for edit in edits {
        if edit.column != value_column {
            let name = header.name_of(edit.column).unwrap_or("?");
            errors.push(format!("Column '{name}' is not editable"));
            continue;
        }
        let Some(current) = table.value_at(edit.row, edit.column) else {
            continue;
        };
        if edit.value.normalized() == current.normalized() {
            continue;
        }
        let Some(id) = table.value_at(edit.row, id_column).and_then(Cell::as_id) else {
            continue;
        };
        payloads.insert(
            id,
            ParameterValueUpdate {
                id: id.into(),
                value: edit.value.to_stored(),
            },
        );
        apply.push(edit.clone());
    }
    ValueUpdatePlan {
        payloads: payloads.into_values().collect(),
        apply,
        errors,
    }
}

/// Changed-cell payloads for committed definition rows, with derived
/// id-column writes (tag id list, value list id) applied alongside the
/// user's edits on success.
pub(crate) struct DefinitionUpdatePlan {
    pub payloads: Vec<ParameterDefinitionUpdate>,
    pub apply: Vec<CellEdit>,
    pub backfill: Vec<CellEdit>,
    pub errors: Vec<String>,
}

pub(crate) fn plan_definition_updates(
    kind: TableKind,
    table: &BackingTable,
    edits: &[CellEdit],
    resolver: &Resolver,
) -> DefinitionUpdatePlan {
    let header = kind.header();
    let (name_col, list_name_col, list_id_col, tag_list_col, tag_id_col, default_col) = match kind {
        TableKind::ObjectParameterDefinition => (
            object_definition::PARAMETER_NAME,
            object_definition::VALUE_LIST_NAME,
            object_definition::VALUE_LIST_ID,
            object_definition::PARAMETER_TAG_LIST,
            object_definition::PARAMETER_TAG_ID_LIST,
            object_definition::DEFAULT_VALUE,
        ),
        TableKind::RelationshipParameterDefinition => (
            relationship_definition::PARAMETER_NAME,
            relationship_definition::VALUE_LIST_NAME,
            relationship_definition::VALUE_LIST_ID,
            relationship_definition::PARAMETER_TAG_LIST,
            relationship_definition::PARAMETER_TAG_ID_LIST,
            relationship_definition::DEFAULT_VALUE,
        ),
        _ => unreachable!("definition update plan is only built for definition kinds"),
    };
    let id_column = kind.id_column();
    let mut payloads: BTreeMap<i64, ParameterDefinitionUpdate> = BTreeMap::new();
    let mut apply = Vec::new();
    let mut backfill = Vec::new();
    let mut errors = Vec::new();
    for edit in edits {
        let Some(current) = table.value_at(edit.row, edit.column) else {
            continue;
        };
        if edit.value.normalized() == current.normalized() {
            continue;
        }
        let Some(id) = table.value_at(edit.row, id_column).and_then(Cell::as_id) else {
            continue;
        };
        let entry = payloads
            .entry(id)
            .or_insert_with(|| ParameterDefinitionUpdate {
                id: id.into(),
                ..ParameterDefinitionUpdate::default()
            });
        if edit.column == name_col {
            entry.name = Some(edit.value.display());
        } else if edit.column == default_col {
            entry.default_value = Some(edit.value.to_stored());
        } else if edit.column == list_name_col {
            match edit.value.as_text() {
                None => {
                    entry.value_list_id = Some(None);
                    backfill.push(CellEdit::new(edit.row, list_id_col, Cell::Empty));
                }
                Some(name) => match resolver.value_list_by_name.get(name) {
                    Some(list_id) => {
                        entry.value_list_id = Some(Some(*list_id));
                        backfill.push(CellEdit::new(edit.row, list_id_col, list_id.get()));
                    }
                    None => {
                        errors.push(format!("Invalid value list '{name}'"));
                        continue;
                    }
                },
            }
        } else if edit.column == tag_list_col {
            match resolve_tag_list(&edit.value, resolver) {
                Ok(tag_ids) => {
                    let id_list = join_ids(tag_ids.iter().map(|tag| tag.get()));
                    entry.tag_ids = Some(tag_ids);
                    backfill.push(CellEdit::new(
                        edit.row,
                        tag_id_col,
                        Cell::list(&id_list),
                    ));
                }
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            }
        } else {
            let name = header.name_of(edit.column).unwrap_or("?");
            errors.push(format!("Column '{name}' is not editable"));
            continue;
        }
        apply.push(edit.clone());
    }
    payloads.retain(|_, payload| !payload.is_noop());
    DefinitionUpdatePlan {
        payloads: payloads.into_values().collect(),
        apply,
        backfill,
        errors,
    }
}

fn resolve_tag_list(cell: &Cell, resolver: &Resolver) -> std::result::Result<Vec<ParameterTagId>, String> {
    let Some(text) = cell.as_text() else {
        return Ok(Vec::new());
    };
    let mut tag_ids = Vec::new();
    for tag in text.split(',') {
        let tag = tag.trim();
        match resolver.tag_by_name.get(tag) {
            Some(id) => tag_ids.push(*id),
            None => return Err(format!("Invalid parameter tag '{tag}'")),
        }
    }
    Ok(tag_ids)
}

/// Items built from staged rows, keyed by staging row, plus resolution
/// errors for the rows left behind.
#[derive(Default)]
pub(crate) struct StagedItems {
    pub value_items: Vec<(usize, NewParameterValue)>,
    pub definition_items: Vec<(usize, NewParameterDefinition)>,
    pub errors: Vec<String>,
}

pub(crate) fn resolve_staged_rows(
    kind: TableKind,
    staging: &mut StagingTable,
    rows: &BTreeSet<usize>,
    resolver: &Resolver,
    backend: &dyn Backend,
) -> Result<StagedItems> {
    match kind {
        TableKind::ObjectParameterValue => Ok(resolve_object_value_rows(staging, rows, resolver)),
        TableKind::RelationshipParameterValue => {
            resolve_relationship_value_rows(staging, rows, resolver, backend)
        }
        TableKind::ObjectParameterDefinition => {
            Ok(resolve_object_definition_rows(staging, rows, resolver))
        }
        TableKind::RelationshipParameterDefinition => {
            Ok(resolve_relationship_definition_rows(staging, rows, resolver))
        }
    }
}

fn staged_text(staging: &StagingTable, row: usize, column: usize) -> Option<String> {
    staging
        .value_at(row, column)
        .and_then(Cell::as_text)
        .map(str::to_owned)
}

fn resolve_object_value_rows(
    staging: &mut StagingTable,
    rows: &BTreeSet<usize>,
    resolver: &Resolver,
) -> StagedItems {
    use object_value as col;
    let mut items = StagedItems::default();
    for &row in rows {
        let class_name = staged_text(staging, row, col::OBJECT_CLASS_NAME);
        let object_name = staged_text(staging, row, col::OBJECT_NAME);
        let parameter_name = staged_text(staging, row, col::PARAMETER_NAME);

        let mut class_id: Option<ObjectClassId> = None;
        let mut object: Option<(ObjectId, ObjectClassId)> = None;
        let mut definition: Option<(ParameterDefinitionId, i64)> = None;

        if let Some(name) = &class_name {
            match resolver.object_class_by_name.get(name) {
                Some(id) => {
                    class_id = Some(*id);
                    staging.set_value(row, col::OBJECT_CLASS_ID, Cell::Id(id.get()));
                }
                None => items.errors.push(format!("Invalid object class '{name}'")),
            }
        }
        if let Some(name) = &object_name {
            match resolver.object_by_name.get(name) {
                Some(found) => {
                    object = Some(*found);
                    staging.set_value(row, col::OBJECT_ID, Cell::Id(found.0.get()));
                }
                None => items.errors.push(format!("Invalid object '{name}'")),
            }
        }
        if let Some(name) = &parameter_name {
            if resolver.definitions_by_name.contains_key(name) {
                definition = resolver.definition_for(name, class_id.map(ObjectClassId::get));
                if let Some((id, _)) = definition {
                    staging.set_value(row, col::PARAMETER_ID, Cell::Id(id.get()));
                }
            } else {
                items.errors.push(format!("Invalid parameter '{name}'"));
            }
        }
        // Back-fill an omitted class from whichever resolved part
        // implies it.
        if class_id.is_none() {
            let implied = object
                .map(|(_, implied)| implied.get())
                .or_else(|| definition.map(|(_, implied)| implied));
            if let Some(implied) = implied
                && let Some(name) = resolver.object_class_name(implied)
            {
                staging.set_value(row, col::OBJECT_CLASS_ID, Cell::Id(implied));
                staging.set_value(row, col::OBJECT_CLASS_NAME, Cell::text(name));
            }
        }
        let (Some((object_id, _)), Some((definition_id, _))) = (object, definition) else {
            continue;
        };
        let value = staging
            .value_at(row, col::VALUE)
            .and_then(Cell::to_stored);
        items.value_items.push((
            row,
            NewParameterValue {
                definition_id,
                owner: OwnerRef::Object(object_id),
                value,
            },
        ));
    }
    items
}

fn resolve_relationship_value_rows(
    staging: &mut StagingTable,
    rows: &BTreeSet<usize>,
    resolver: &Resolver,
    backend: &dyn Backend,
) -> Result<StagedItems> {
    use relationship_value as col;
    let mut items = StagedItems::default();
    // Row -> resolved relationship id, or the item to create on the fly.
    let mut resolved: BTreeMap<usize, RelationshipId> = BTreeMap::new();
    let mut to_create: BTreeMap<usize, NewRelationship> = BTreeMap::new();
    let mut definitions: BTreeMap<usize, ParameterDefinitionId> = BTreeMap::new();

    for &row in rows {
        let class_name = staged_text(staging, row, col::RELATIONSHIP_CLASS_NAME);
        let member_names = staged_text(staging, row, col::OBJECT_NAME_LIST);
        let parameter_name = staged_text(staging, row, col::PARAMETER_NAME);

        let mut class: Option<RelationshipClass> = None;
        let mut member_ids: Option<Vec<ObjectId>> = None;
        let mut definition: Option<(ParameterDefinitionId, i64)> = None;

        if let Some(name) = &class_name {
            match resolver.relationship_class_by_name.get(name) {
                Some(found) => {
                    staging.set_value(row, col::RELATIONSHIP_CLASS_ID, Cell::Id(found.id.get()));
                    staging.set_value(
                        row,
                        col::OBJECT_CLASS_ID_LIST,
                        Cell::list(&found.object_class_id_list()),
                    );
                    staging.set_value(
                        row,
                        col::OBJECT_CLASS_NAME_LIST,
                        Cell::text(resolver.class_name_list(found)),
                    );
                    class = Some(found.clone());
                }
                None => items
                    .errors
                    .push(format!("Invalid relationship class '{name}'")),
            }
        }
        if let Some(names) = &member_names {
            let mut ids = Vec::new();
            let mut all_resolved = true;
            for name in names.split(',') {
                let name = name.trim();
                match resolver.object_by_name.get(name) {
                    Some((id, _)) => ids.push(*id),
                    None => {
                        items.errors.push(format!("Invalid object '{name}'"));
                        all_resolved = false;
                        break;
                    }
                }
            }
            if all_resolved {
                let joined = join_ids(ids.iter().map(|id| id.get()));
                staging.set_value(row, col::OBJECT_ID_LIST, Cell::list(&joined));
                member_ids = Some(ids);
            }
        }
        if let Some(name) = &parameter_name {
            if resolver.definitions_by_name.contains_key(name) {
                definition =
                    resolver.definition_for(name, class.as_ref().map(|c| c.id.get()));
                if let Some((id, _)) = definition {
                    staging.set_value(row, col::PARAMETER_ID, Cell::Id(id.get()));
                }
            } else {
                items.errors.push(format!("Invalid parameter '{name}'"));
            }
        }
        if class.is_none()
            && let Some((_, class_raw)) = definition
            && let Some(found) = resolver.relationship_class_by_id.get(&class_raw)
        {
            staging.set_value(row, col::RELATIONSHIP_CLASS_ID, Cell::Id(found.id.get()));
            staging.set_value(row, col::RELATIONSHIP_CLASS_NAME, Cell::text(&found.name));
            staging.set_value(
                row,
                col::OBJECT_CLASS_ID_LIST,
                Cell::list(&found.object_class_id_list()),
            );
            staging.set_value(
                row,
                col::OBJECT_CLASS_NAME_LIST,
                Cell::text(resolver.class_name_list(found)),
            );
            class = Some(found.clone());
        }
        if let Some((id, _)) = definition {
            definitions.insert(row, id);
        }
        let (Some(class), Some(member_ids)) = (class, member_ids) else {
            continue;
        };
        let joined = join_ids(member_ids.iter().map(|id| id.get()));
        match resolver.relationship_by_key.get(&(class.id.get(), joined)) {
            Some(relationship_id) => {
                resolved.insert(row, *relationship_id);
            }
            None => {
                let member_names = member_names.unwrap_or_default();
                to_create.insert(
                    row,
                    NewRelationship {
                        class_id: class.id,
                        name: format!("{}_{}", class.name, member_names.replace(',', "__")),
                        object_ids: member_ids,
                    },
                );
            }
        }
    }

    // Create missing relationships on the fly; a creation failure aborts
    // only that row's item.
    if !to_create.is_empty() {
        let requested: Vec<NewRelationship> = to_create.values().cloned().collect();
        let created = backend.add_relationships(&requested)?;
        items.errors.extend(created.errors);
        for relationship in &created.items {
            let key = (relationship.class_id, relationship.object_id_list());
            for (row, request) in &to_create {
                let request_key = (
                    request.class_id,
                    join_ids(request.object_ids.iter().map(|id| id.get())),
                );
                if request_key == key {
                    resolved.insert(*row, relationship.id);
                }
            }
        }
    }

    for (&row, &relationship_id) in &resolved {
        let Some(&definition_id) = definitions.get(&row) else {
            continue;
        };
        staging.set_value(row, col::RELATIONSHIP_ID, Cell::Id(relationship_id.get()));
        let value = staging
            .value_at(row, col::VALUE)
            .and_then(Cell::to_stored);
        items.value_items.push((
            row,
            NewParameterValue {
                definition_id,
                owner: OwnerRef::Relationship(relationship_id),
                value,
            },
        ));
    }
    Ok(items)
}

fn resolve_object_definition_rows(
    staging: &mut StagingTable,
    rows: &BTreeSet<usize>,
    resolver: &Resolver,
) -> StagedItems {
    use object_definition as col;
    let mut items = StagedItems::default();
    for &row in rows {
        let class_name = staged_text(staging, row, col::OBJECT_CLASS_NAME);
        let parameter_name = staged_text(staging, row, col::PARAMETER_NAME);

        let mut class_id: Option<ObjectClassId> = None;
        if let Some(name) = &class_name {
            match resolver.object_class_by_name.get(name) {
                Some(id) => {
                    class_id = Some(*id);
                    staging.set_value(row, col::OBJECT_CLASS_ID, Cell::Id(id.get()));
                }
                None => items.errors.push(format!("Invalid object class '{name}'")),
            }
        }
        let extras = resolve_definition_extras(
            staging,
            row,
            col::VALUE_LIST_NAME,
            col::VALUE_LIST_ID,
            col::PARAMETER_TAG_LIST,
            col::PARAMETER_TAG_ID_LIST,
            resolver,
            &mut items.errors,
        );
        let (Some(class_id), Some(name), Some((value_list_id, tag_ids))) =
            (class_id, parameter_name, extras)
        else {
            continue;
        };
        let default_value = staging
            .value_at(row, col::DEFAULT_VALUE)
            .and_then(Cell::to_stored);
        items.definition_items.push((
            row,
            NewParameterDefinition {
                class: ClassRef::Object(class_id),
                name,
                default_value,
                value_list_id,
                tag_ids,
            },
        ));
    }
    items
}

fn resolve_relationship_definition_rows(
    staging: &mut StagingTable,
    rows: &BTreeSet<usize>,
    resolver: &Resolver,
) -> StagedItems {
    use relationship_definition as col;
    let mut items = StagedItems::default();
    for &row in rows {
        let class_name = staged_text(staging, row, col::RELATIONSHIP_CLASS_NAME);
        let parameter_name = staged_text(staging, row, col::PARAMETER_NAME);

        let mut class_id = None;
        if let Some(name) = &class_name {
            match resolver.relationship_class_by_name.get(name) {
                Some(found) => {
                    class_id = Some(found.id);
                    staging.set_value(row, col::RELATIONSHIP_CLASS_ID, Cell::Id(found.id.get()));
                    staging.set_value(
                        row,
                        col::OBJECT_CLASS_ID_LIST,
                        Cell::list(&found.object_class_id_list()),
                    );
                    staging.set_value(
                        row,
                        col::OBJECT_CLASS_NAME_LIST,
                        Cell::text(resolver.class_name_list(found)),
                    );
                }
                None => items
                    .errors
                    .push(format!("Invalid relationship class '{name}'")),
            }
        }
        let extras = resolve_definition_extras(
            staging,
            row,
            col::VALUE_LIST_NAME,
            col::VALUE_LIST_ID,
            col::PARAMETER_TAG_LIST,
            col::PARAMETER_TAG_ID_LIST,
            resolver,
            &mut items.errors,
        );
        let (Some(class_id), Some(name), Some((value_list_id, tag_ids))) =
            (class_id, parameter_name, extras)
        else {
            continue;
        };
        let default_value = staging
            .value_at(row, col::DEFAULT_VALUE)
            .and_then(Cell::to_stored);
        items.definition_items.push((
            row,
            NewParameterDefinition {
                class: ClassRef::Relationship(class_id),
                name,
                default_value,
                value_list_id,
                tag_ids,
            },
        ));
    }
    items
}

/// Resolve the value-list and tag-list columns shared by both definition
/// kinds. Returns None when either resolution failed, keeping the row
/// out of the commit batch.
#[allow(clippy::too_many_arguments)]
fn resolve_definition_extras(
    staging: &mut StagingTable,
    row: usize,
    list_name_col: usize,
    list_id_col: usize,
    tag_list_col: usize,
    tag_id_col: usize,
    resolver: &Resolver,
    errors: &mut Vec<String>,
) -> Option<(Option<ValueListId>, Vec<ParameterTagId>)> {
    let mut value_list_id = None;
    if let Some(name) = staged_text(staging, row, list_name_col) {
        match resolver.value_list_by_name.get(&name) {
            Some(id) => {
                value_list_id = Some(*id);
                staging.set_value(row, list_id_col, Cell::Id(id.get()));
            }
            None => {
                errors.push(format!("Invalid value list '{name}'"));
                return None;
            }
        }
    }
    let tag_cell = staging
        .value_at(row, tag_list_col)
        .cloned()
        .unwrap_or(Cell::Empty);
    match resolve_tag_list(&tag_cell, resolver) {
        Ok(tag_ids) => {
            if !tag_ids.is_empty() {
                let joined = join_ids(tag_ids.iter().map(|tag| tag.get()));
                staging.set_value(row, tag_id_col, Cell::list(&joined));
            }
            Some((value_list_id, tag_ids))
        }
        Err(message) => {
            errors.push(message);
            None
        }
    }
}

/// Match store-accepted value records back to the staged rows that
/// produced them, by (definition, owner) natural key.
pub(crate) fn match_added_values(
    submitted: &[(usize, NewParameterValue)],
    added: &[ParameterValue],
) -> Vec<(usize, ParameterValue)> {
    let mut matched = Vec::new();
    for record in added {
        let found = submitted.iter().find(|(_, item)| {
            item.definition_id == record.definition_id
                && item.owner.raw_id() == record.owner.raw_id()
        });
        if let Some((row, _)) = found {
            matched.push((*row, record.clone()));
        }
    }
    matched
}

/// Match store-accepted definition records back to staged rows by
/// (class, name).
pub(crate) fn match_added_definitions(
    submitted: &[(usize, NewParameterDefinition)],
    added: &[ParameterDefinition],
) -> Vec<(usize, ParameterDefinition)> {
    let mut matched = Vec::new();
    for record in added {
        let found = submitted.iter().find(|(_, item)| {
            item.class == record.class && item.name == record.name
        });
        if let Some((row, _)) = found {
            matched.push((*row, record.clone()));
        }
    }
    matched
}

pub(crate) fn split_id_cells(cell: &Cell) -> Vec<i64> {
    cell.as_text().and_then(split_ids).unwrap_or_default()
}
