// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::ids::*;
use crate::kind::TableKind;
use crate::records::*;

/// Change notification emitted by the external store after a mutation.
/// Renames arrive as `*Updated` events carrying the full new record; the
/// cascade handler rewrites denormalized columns from them. Removals
/// carry the removed records so dependent rows can be located without a
/// further store round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    ObjectClassesAdded(Vec<ObjectClass>),
    ObjectClassesUpdated(Vec<ObjectClass>),
    ObjectClassesRemoved(Vec<ObjectClass>),
    ObjectsAdded(Vec<EntityObject>),
    ObjectsUpdated(Vec<EntityObject>),
    ObjectsRemoved(Vec<EntityObject>),
    RelationshipClassesAdded(Vec<RelationshipClass>),
    RelationshipClassesUpdated(Vec<RelationshipClass>),
    RelationshipClassesRemoved(Vec<RelationshipClass>),
    RelationshipsAdded(Vec<Relationship>),
    RelationshipsRemoved(Vec<Relationship>),
    ParameterDefinitionsUpdated(Vec<ParameterDefinition>),
    ParameterDefinitionsRemoved(Vec<ParameterDefinition>),
    ParameterValuesRemoved(Vec<ParameterValue>),
    ParameterTagsUpdated(Vec<ParameterTag>),
    ParameterTagsRemoved(Vec<ParameterTagId>),
    ValueListsUpdated(Vec<ParameterValueList>),
    ValueListsRemoved(Vec<ValueListId>),
    /// Denormalized rows added to one table kind outside the composite's
    /// own staging flow (e.g. another editor on the same store).
    TableRowsAdded {
        kind: TableKind,
        rows: Vec<Vec<Cell>>,
    },
}

impl ChangeEvent {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::ObjectClassesAdded(items)
            | Self::ObjectClassesUpdated(items)
            | Self::ObjectClassesRemoved(items) => items.is_empty(),
            Self::ObjectsAdded(items) | Self::ObjectsUpdated(items) | Self::ObjectsRemoved(items) => {
                items.is_empty()
            }
            Self::RelationshipClassesAdded(items)
            | Self::RelationshipClassesUpdated(items)
            | Self::RelationshipClassesRemoved(items) => items.is_empty(),
            Self::RelationshipsAdded(items) | Self::RelationshipsRemoved(items) => items.is_empty(),
            Self::ParameterDefinitionsUpdated(items) | Self::ParameterDefinitionsRemoved(items) => {
                items.is_empty()
            }
            Self::ParameterValuesRemoved(items) => items.is_empty(),
            Self::ParameterTagsUpdated(items) => items.is_empty(),
            Self::ParameterTagsRemoved(items) => items.is_empty(),
            Self::ValueListsUpdated(items) => items.is_empty(),
            Self::ValueListsRemoved(items) => items.is_empty(),
            Self::TableRowsAdded { rows, .. } => rows.is_empty(),
        }
    }
}
