// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tabula_model::{
    Cell, ClassRef, EntityObject, ObjectClass, ObjectId, OwnerRef, ParameterDefinition,
    ParameterDefinitionId, ParameterTag, ParameterTagId, ParameterValue, ParameterValueId,
    ParameterValueList, Relationship, RelationshipClass, RelationshipClassId, TableKind,
    ValueListId,
};

/// Result of a per-item batch mutation: the records the store actually
/// accepted (with assigned ids) plus one message per rejected item.
/// Acceptance is all-or-nothing per item, never per batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upserted<T> {
    pub items: Vec<T>,
    pub errors: Vec<String>,
}

impl<T> Upserted<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationship {
    pub class_id: RelationshipClassId,
    pub name: String,
    pub object_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameterValue {
    pub definition_id: ParameterDefinitionId,
    pub owner: OwnerRef,
    pub value: Option<String>,
}

/// Minimal change payload for one committed value row; only rows whose
/// value actually changed are ever submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValueUpdate {
    pub id: ParameterValueId,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameterDefinition {
    pub class: ClassRef,
    pub name: String,
    pub default_value: Option<String>,
    pub value_list_id: Option<ValueListId>,
    pub tag_ids: Vec<ParameterTagId>,
}

/// Minimal change payload for one committed definition row. `None`
/// fields are untouched; the nested options distinguish "set to no
/// value" from "leave alone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDefinitionUpdate {
    pub id: ParameterDefinitionId,
    pub name: Option<String>,
    pub default_value: Option<Option<String>>,
    pub value_list_id: Option<Option<ValueListId>>,
    pub tag_ids: Option<Vec<ParameterTagId>>,
}

impl ParameterDefinitionUpdate {
    pub fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.default_value.is_none()
            && self.value_list_id.is_none()
            && self.tag_ids.is_none()
    }
}

/// The external relational store, seen from the engine. Calls are
/// synchronous and block the edit operation until the store answers.
pub trait Backend {
    fn object_class_list(&self) -> Result<Vec<ObjectClass>>;
    fn object_list(&self) -> Result<Vec<EntityObject>>;
    fn relationship_class_list(&self) -> Result<Vec<RelationshipClass>>;
    fn relationship_list(&self) -> Result<Vec<Relationship>>;
    fn parameter_definition_list(&self) -> Result<Vec<ParameterDefinition>>;
    fn parameter_tag_list(&self) -> Result<Vec<ParameterTag>>;
    fn value_list_list(&self) -> Result<Vec<ParameterValueList>>;

    /// Denormalized rows for one table kind, aligned to the kind's
    /// header, ready to load into backing tables.
    fn table_rows(&self, kind: TableKind) -> Result<Vec<Vec<Cell>>>;

    fn add_relationships(&self, items: &[NewRelationship]) -> Result<Upserted<Relationship>>;
    fn add_parameter_values(&self, items: &[NewParameterValue]) -> Result<Upserted<ParameterValue>>;
    fn update_parameter_values(
        &self,
        items: &[ParameterValueUpdate],
    ) -> Result<Upserted<ParameterValue>>;
    fn add_parameter_definitions(
        &self,
        items: &[NewParameterDefinition],
    ) -> Result<Upserted<ParameterDefinition>>;
    fn update_parameter_definitions(
        &self,
        items: &[ParameterDefinitionUpdate],
    ) -> Result<Upserted<ParameterDefinition>>;
}
