// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use tabula_engine::CompositeTable;
use tabula_model::{
    ObjectClassId, ObjectId, ParameterDefinitionId, RelationshipClassId, RelationshipId, TableKind,
};
use tabula_store::Store;

pub fn memory_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

/// A bootstrapped in-memory store populated with the demo catalog
/// (fish/dog classes, nemo/pluto/scrooge, the fish__dog relationship,
/// tags, a value list and a handful of parameters).
pub fn seeded_store() -> Result<Store> {
    let store = memory_store()?;
    store.seed_demo_catalog()?;
    Ok(store)
}

/// A composite table of the given kind loaded from the store.
pub fn loaded_table(store: &Store, kind: TableKind) -> Result<CompositeTable> {
    let mut table = CompositeTable::new(kind);
    table.reset_from_backend(store)?;
    Ok(table)
}

pub fn object_class_id(store: &Store, name: &str) -> Result<ObjectClassId> {
    store
        .object_class_list()?
        .into_iter()
        .find(|class| class.name == name)
        .map(|class| class.id)
        .ok_or_else(|| anyhow!("no object class named '{name}' in fixture"))
}

pub fn object_id(store: &Store, name: &str) -> Result<ObjectId> {
    store
        .object_list()?
        .into_iter()
        .find(|object| object.name == name)
        .map(|object| object.id)
        .ok_or_else(|| anyhow!("no object named '{name}' in fixture"))
}

pub fn relationship_class_id(store: &Store, name: &str) -> Result<RelationshipClassId> {
    store
        .relationship_class_list()?
        .into_iter()
        .find(|class| class.name == name)
        .map(|class| class.id)
        .ok_or_else(|| anyhow!("no relationship class named '{name}' in fixture"))
}

pub fn relationship_id(store: &Store, name: &str) -> Result<RelationshipId> {
    store
        .relationship_list()?
        .into_iter()
        .find(|relationship| relationship.name == name)
        .map(|relationship| relationship.id)
        .ok_or_else(|| anyhow!("no relationship named '{name}' in fixture"))
}

pub fn definition_id(store: &Store, name: &str) -> Result<ParameterDefinitionId> {
    store
        .parameter_definition_list()?
        .into_iter()
        .find(|definition| definition.name == name)
        .map(|definition| definition.id)
        .ok_or_else(|| anyhow!("no parameter definition named '{name}' in fixture"))
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tabula.db");
    Ok((dir, path))
}
