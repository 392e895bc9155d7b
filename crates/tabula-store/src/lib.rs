// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

mod backend_impl;

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tabula_engine::Upserted;
use tabula_model::{
    ChangeEvent, ClassRef, EntityObject, ObjectClass, ObjectClassId, ObjectId, OwnerRef,
    ParameterDefinition, ParameterDefinitionId, ParameterTag, ParameterTagId, ParameterValue,
    ParameterValueId, ParameterValueList, Relationship, RelationshipClass, RelationshipClassId,
    RelationshipId, ValueListId, join_ids, split_ids,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "tabula";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "object_classes",
        &["id", "name", "created_at", "updated_at"],
    ),
    (
        "objects",
        &["id", "class_id", "name", "created_at", "updated_at"],
    ),
    (
        "relationship_classes",
        &[
            "id",
            "name",
            "object_class_id_list",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "relationships",
        &[
            "id",
            "class_id",
            "name",
            "object_id_list",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "parameter_value_lists",
        &["id", "name", "value_list", "created_at", "updated_at"],
    ),
    (
        "parameter_definitions",
        &[
            "id",
            "object_class_id",
            "relationship_class_id",
            "name",
            "default_value",
            "value_list_id",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "parameter_values",
        &[
            "id",
            "definition_id",
            "object_id",
            "relationship_id",
            "value",
            "created_at",
            "updated_at",
        ],
    ),
    ("parameter_tags", &["id", "tag", "created_at", "updated_at"]),
    (
        "parameter_definition_tags",
        &["definition_id", "tag_id", "position"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_object_classes_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_object_classes_name ON object_classes (name);",
    },
    RequiredIndex {
        name: "idx_objects_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_objects_name ON objects (name);",
    },
    RequiredIndex {
        name: "idx_objects_class_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_objects_class_id ON objects (class_id);",
    },
    RequiredIndex {
        name: "idx_relationship_classes_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_relationship_classes_name ON relationship_classes (name);",
    },
    RequiredIndex {
        name: "idx_relationships_class_members",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_class_members ON relationships (class_id, object_id_list);",
    },
    RequiredIndex {
        name: "idx_parameter_definitions_object_class_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_parameter_definitions_object_class_id ON parameter_definitions (object_class_id);",
    },
    RequiredIndex {
        name: "idx_parameter_definitions_relationship_class_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_parameter_definitions_relationship_class_id ON parameter_definitions (relationship_class_id);",
    },
    RequiredIndex {
        name: "idx_parameter_definitions_class_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_parameter_definitions_class_name ON parameter_definitions (IFNULL(object_class_id, 0), IFNULL(relationship_class_id, 0), name);",
    },
    RequiredIndex {
        name: "idx_parameter_values_definition_owner",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_parameter_values_definition_owner ON parameter_values (definition_id, IFNULL(object_id, 0), IFNULL(relationship_id, 0));",
    },
    RequiredIndex {
        name: "idx_parameter_values_object_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_parameter_values_object_id ON parameter_values (object_id);",
    },
    RequiredIndex {
        name: "idx_parameter_values_relationship_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_parameter_values_relationship_id ON parameter_values (relationship_id);",
    },
    RequiredIndex {
        name: "idx_parameter_tags_tag",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_parameter_tags_tag ON parameter_tags (tag);",
    },
    RequiredIndex {
        name: "idx_parameter_value_lists_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_parameter_value_lists_name ON parameter_value_lists (name);",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObjectClass {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub class_id: ObjectClassId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationshipClass {
    pub name: String,
    pub object_class_ids: Vec<ObjectClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameterTag {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValueList {
    pub name: String,
    pub values: Vec<String>,
}

pub fn default_db_path() -> Result<PathBuf> {
    let data_root = dirs::data_dir()
        .ok_or_else(|| anyhow!("cannot resolve data directory; pass an explicit database path"))?;
    Ok(data_root.join(APP_NAME).join("tabula.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    // ---- listings -------------------------------------------------------

    pub fn object_class_list(&self) -> Result<Vec<ObjectClass>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM object_classes ORDER BY name ASC, id ASC")
            .context("prepare object classes query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ObjectClass {
                    id: ObjectClassId::new(row.get(0)?),
                    name: row.get(1)?,
                })
            })
            .context("query object classes")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect object classes")
    }

    pub fn object_list(&self) -> Result<Vec<EntityObject>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, class_id, name FROM objects ORDER BY class_id ASC, name ASC")
            .context("prepare objects query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EntityObject {
                    id: ObjectId::new(row.get(0)?),
                    class_id: ObjectClassId::new(row.get(1)?),
                    name: row.get(2)?,
                })
            })
            .context("query objects")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect objects")
    }

    pub fn relationship_class_list(&self) -> Result<Vec<RelationshipClass>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, object_class_id_list FROM relationship_classes ORDER BY id ASC",
            )
            .context("prepare relationship classes query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("query relationship classes")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect relationship classes")?;

        raw.into_iter()
            .map(|(id, name, id_list)| {
                let member_ids = split_ids(&id_list).ok_or_else(|| {
                    anyhow!("relationship class {id} has a malformed member class list {id_list:?}")
                })?;
                Ok(RelationshipClass {
                    id: RelationshipClassId::new(id),
                    name,
                    object_class_ids: member_ids.into_iter().map(ObjectClassId::new).collect(),
                })
            })
            .collect()
    }

    pub fn relationship_list(&self) -> Result<Vec<Relationship>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, class_id, name, object_id_list FROM relationships ORDER BY id ASC")
            .context("prepare relationships query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query relationships")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect relationships")?;

        raw.into_iter()
            .map(|(id, class_id, name, id_list)| {
                let member_ids = split_ids(&id_list).ok_or_else(|| {
                    anyhow!("relationship {id} has a malformed member list {id_list:?}")
                })?;
                Ok(Relationship {
                    id: RelationshipId::new(id),
                    class_id: RelationshipClassId::new(class_id),
                    name,
                    object_ids: member_ids.into_iter().map(ObjectId::new).collect(),
                })
            })
            .collect()
    }

    pub fn parameter_definition_list(&self) -> Result<Vec<ParameterDefinition>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, object_class_id, relationship_class_id, name, default_value, value_list_id
                FROM parameter_definitions
                ORDER BY id ASC
                ",
            )
            .context("prepare parameter definitions query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            })
            .context("query parameter definitions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect parameter definitions")?;

        let mut tag_ids_by_definition = self.tag_ids_by_definition()?;
        raw.into_iter()
            .map(|(id, object_class_id, relationship_class_id, name, default_value, value_list_id)| {
                let class = class_ref(id, object_class_id, relationship_class_id)?;
                Ok(ParameterDefinition {
                    id: ParameterDefinitionId::new(id),
                    class,
                    name,
                    default_value,
                    value_list_id: value_list_id.map(ValueListId::new),
                    tag_ids: tag_ids_by_definition.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    pub fn parameter_tag_list(&self) -> Result<Vec<ParameterTag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, tag FROM parameter_tags ORDER BY tag ASC")
            .context("prepare parameter tags query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ParameterTag {
                    id: ParameterTagId::new(row.get(0)?),
                    tag: row.get(1)?,
                })
            })
            .context("query parameter tags")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect parameter tags")
    }

    pub fn value_list_list(&self) -> Result<Vec<ParameterValueList>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, value_list FROM parameter_value_lists ORDER BY name ASC")
            .context("prepare value lists query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("query value lists")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect value lists")?;

        raw.into_iter()
            .map(|(id, name, value_list)| {
                let values: Vec<String> = if value_list.is_empty() {
                    Vec::new()
                } else {
                    serde_json::from_str(&value_list).with_context(|| {
                        format!("parse value list {id} payload {value_list:?}")
                    })?
                };
                Ok(ParameterValueList {
                    id: ValueListId::new(id),
                    name,
                    values,
                })
            })
            .collect()
    }

    pub fn parameter_value_records(&self) -> Result<Vec<ParameterValue>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, definition_id, object_id, relationship_id, value FROM parameter_values ORDER BY id ASC",
            )
            .context("prepare parameter values query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .context("query parameter values")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect parameter values")?;

        raw.into_iter()
            .map(|(id, definition_id, object_id, relationship_id, value)| {
                let owner = owner_ref(id, object_id, relationship_id)?;
                Ok(ParameterValue {
                    id: ParameterValueId::new(id),
                    definition_id: ParameterDefinitionId::new(definition_id),
                    owner,
                    value,
                })
            })
            .collect()
    }

    // ---- per-item batch adds -------------------------------------------

    pub fn add_object_classes(&self, items: &[NewObjectClass]) -> Result<Upserted<ObjectClass>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.name.trim().is_empty() {
                outcome.errors.push("Object class name is required".to_owned());
                continue;
            }
            if self.name_taken("object_classes", &item.name)? {
                outcome
                    .errors
                    .push(format!("There's already an object class called '{}'", item.name));
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO object_classes (name, created_at, updated_at) VALUES (?, ?, ?)",
                    params![item.name, now, now],
                )
                .with_context(|| format!("insert object class {}", item.name))?;
            outcome.items.push(ObjectClass {
                id: ObjectClassId::new(self.conn.last_insert_rowid()),
                name: item.name.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn add_objects(&self, items: &[NewObject]) -> Result<Upserted<EntityObject>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.name.trim().is_empty() {
                outcome.errors.push("Object name is required".to_owned());
                continue;
            }
            if self.get_object_class(item.class_id)?.is_none() {
                outcome
                    .errors
                    .push(format!("Unknown object class {}", item.class_id.get()));
                continue;
            }
            if self.name_taken("objects", &item.name)? {
                outcome
                    .errors
                    .push(format!("There's already an object called '{}'", item.name));
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO objects (class_id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
                    params![item.class_id.get(), item.name, now, now],
                )
                .with_context(|| format!("insert object {}", item.name))?;
            outcome.items.push(EntityObject {
                id: ObjectId::new(self.conn.last_insert_rowid()),
                class_id: item.class_id,
                name: item.name.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn add_relationship_classes(
        &self,
        items: &[NewRelationshipClass],
    ) -> Result<Upserted<RelationshipClass>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.name.trim().is_empty() {
                outcome
                    .errors
                    .push("Relationship class name is required".to_owned());
                continue;
            }
            if item.object_class_ids.is_empty() {
                outcome.errors.push(format!(
                    "Relationship class '{}' needs at least one member class",
                    item.name
                ));
                continue;
            }
            if self.name_taken("relationship_classes", &item.name)? {
                outcome.errors.push(format!(
                    "There's already a relationship class called '{}'",
                    item.name
                ));
                continue;
            }
            let mut unknown = None;
            for class_id in &item.object_class_ids {
                if self.get_object_class(*class_id)?.is_none() {
                    unknown = Some(*class_id);
                    break;
                }
            }
            if let Some(class_id) = unknown {
                outcome
                    .errors
                    .push(format!("Unknown object class {}", class_id.get()));
                continue;
            }
            let id_list = join_ids(item.object_class_ids.iter().map(|id| id.get()));
            self.conn
                .execute(
                    "
                    INSERT INTO relationship_classes (name, object_class_id_list, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ",
                    params![item.name, id_list, now, now],
                )
                .with_context(|| format!("insert relationship class {}", item.name))?;
            outcome.items.push(RelationshipClass {
                id: RelationshipClassId::new(self.conn.last_insert_rowid()),
                name: item.name.clone(),
                object_class_ids: item.object_class_ids.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn add_parameter_tags(&self, items: &[NewParameterTag]) -> Result<Upserted<ParameterTag>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.tag.trim().is_empty() {
                outcome.errors.push("Parameter tag is required".to_owned());
                continue;
            }
            let taken: bool = self
                .conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM parameter_tags WHERE tag = ?)",
                    params![item.tag],
                    |row| row.get(0),
                )
                .context("check parameter tag uniqueness")?;
            if taken {
                outcome
                    .errors
                    .push(format!("There's already a parameter tag '{}'", item.tag));
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO parameter_tags (tag, created_at, updated_at) VALUES (?, ?, ?)",
                    params![item.tag, now, now],
                )
                .with_context(|| format!("insert parameter tag {}", item.tag))?;
            outcome.items.push(ParameterTag {
                id: ParameterTagId::new(self.conn.last_insert_rowid()),
                tag: item.tag.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn add_value_lists(&self, items: &[NewValueList]) -> Result<Upserted<ParameterValueList>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.name.trim().is_empty() {
                outcome.errors.push("Value list name is required".to_owned());
                continue;
            }
            if self.name_taken("parameter_value_lists", &item.name)? {
                outcome
                    .errors
                    .push(format!("There's already a value list called '{}'", item.name));
                continue;
            }
            let payload =
                serde_json::to_string(&item.values).context("serialize value list payload")?;
            self.conn
                .execute(
                    "
                    INSERT INTO parameter_value_lists (name, value_list, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ",
                    params![item.name, payload, now, now],
                )
                .with_context(|| format!("insert value list {}", item.name))?;
            outcome.items.push(ParameterValueList {
                id: ValueListId::new(self.conn.last_insert_rowid()),
                name: item.name.clone(),
                values: item.values.clone(),
            });
        }
        Ok(outcome)
    }

    // ---- renames --------------------------------------------------------

    pub fn rename_object_class(&self, id: ObjectClassId, name: &str) -> Result<ChangeEvent> {
        self.rename_row("object_classes", "name", id.get(), name, "object class")?;
        let class = self
            .get_object_class(id)?
            .ok_or_else(|| anyhow!("object class {} not found after rename", id.get()))?;
        Ok(ChangeEvent::ObjectClassesUpdated(vec![class]))
    }

    pub fn rename_object(&self, id: ObjectId, name: &str) -> Result<ChangeEvent> {
        self.rename_row("objects", "name", id.get(), name, "object")?;
        let object = self
            .get_object(id)?
            .ok_or_else(|| anyhow!("object {} not found after rename", id.get()))?;
        Ok(ChangeEvent::ObjectsUpdated(vec![object]))
    }

    pub fn rename_relationship_class(
        &self,
        id: RelationshipClassId,
        name: &str,
    ) -> Result<ChangeEvent> {
        self.rename_row(
            "relationship_classes",
            "name",
            id.get(),
            name,
            "relationship class",
        )?;
        let class = self
            .get_relationship_class(id)?
            .ok_or_else(|| anyhow!("relationship class {} not found after rename", id.get()))?;
        Ok(ChangeEvent::RelationshipClassesUpdated(vec![class]))
    }

    pub fn rename_parameter_definition(
        &self,
        id: ParameterDefinitionId,
        name: &str,
    ) -> Result<ChangeEvent> {
        self.rename_row(
            "parameter_definitions",
            "name",
            id.get(),
            name,
            "parameter definition",
        )?;
        let definition = self
            .get_parameter_definition(id)?
            .ok_or_else(|| anyhow!("parameter definition {} not found after rename", id.get()))?;
        Ok(ChangeEvent::ParameterDefinitionsUpdated(vec![definition]))
    }

    pub fn rename_parameter_tag(&self, id: ParameterTagId, tag: &str) -> Result<ChangeEvent> {
        self.rename_row("parameter_tags", "tag", id.get(), tag, "parameter tag")?;
        Ok(ChangeEvent::ParameterTagsUpdated(vec![ParameterTag {
            id,
            tag: tag.to_owned(),
        }]))
    }

    pub fn rename_value_list(&self, id: ValueListId, name: &str) -> Result<ChangeEvent> {
        self.rename_row("parameter_value_lists", "name", id.get(), name, "value list")?;
        let value_list = self
            .value_list_list()?
            .into_iter()
            .find(|list| list.id == id)
            .ok_or_else(|| anyhow!("value list {} not found after rename", id.get()))?;
        Ok(ChangeEvent::ValueListsUpdated(vec![value_list]))
    }

    fn rename_row(
        &self,
        table: &str,
        column: &str,
        id: i64,
        value: &str,
        label: &str,
    ) -> Result<()> {
        if value.trim().is_empty() {
            bail!("{label} name must not be empty");
        }
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                &format!("UPDATE {table} SET {column} = ?, updated_at = ? WHERE id = ?"),
                params![value, now, id],
            )
            .with_context(|| format!("rename {label} {id}"))?;
        if rows_affected == 0 {
            bail!("{label} {id} not found -- refresh and retry");
        }
        Ok(())
    }

    // ---- removals with dependent cascades ------------------------------

    pub fn remove_object_class(&self, id: ObjectClassId) -> Result<Vec<ChangeEvent>> {
        let class = self
            .get_object_class(id)?
            .ok_or_else(|| anyhow!("object class {} not found", id.get()))?;
        let objects: Vec<EntityObject> = self
            .object_list()?
            .into_iter()
            .filter(|object| object.class_id == id)
            .collect();
        let doomed_classes: Vec<RelationshipClass> = self
            .relationship_class_list()?
            .into_iter()
            .filter(|relationship_class| relationship_class.object_class_ids.contains(&id))
            .collect();

        let mut events = Vec::new();
        for relationship_class in &doomed_classes {
            events.extend(self.remove_relationship_class(relationship_class.id)?);
        }
        for object in &objects {
            events.extend(self.remove_object(object.id)?);
        }
        let definitions: Vec<ParameterDefinition> = self
            .parameter_definition_list()?
            .into_iter()
            .filter(|definition| definition.class == ClassRef::Object(id))
            .collect();
        for definition in &definitions {
            events.extend(self.remove_parameter_definition(definition.id)?);
        }
        self.conn
            .execute("DELETE FROM object_classes WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete object class {}", id.get()))?;
        events.push(ChangeEvent::ObjectClassesRemoved(vec![class]));
        Ok(events)
    }

    pub fn remove_object(&self, id: ObjectId) -> Result<Vec<ChangeEvent>> {
        let object = self
            .get_object(id)?
            .ok_or_else(|| anyhow!("object {} not found", id.get()))?;
        let dependent_relationships: Vec<Relationship> = self
            .relationship_list()?
            .into_iter()
            .filter(|relationship| relationship.object_ids.contains(&id))
            .collect();

        let mut events = Vec::new();
        for relationship in &dependent_relationships {
            events.extend(self.remove_relationship(relationship.id)?);
        }
        let orphaned_values: Vec<ParameterValue> = self
            .parameter_value_records()?
            .into_iter()
            .filter(|value| value.owner == OwnerRef::Object(id))
            .collect();
        for value in &orphaned_values {
            self.conn
                .execute(
                    "DELETE FROM parameter_values WHERE id = ?",
                    params![value.id.get()],
                )
                .with_context(|| format!("delete parameter value {}", value.id.get()))?;
        }
        if !orphaned_values.is_empty() {
            events.push(ChangeEvent::ParameterValuesRemoved(orphaned_values));
        }
        self.conn
            .execute("DELETE FROM objects WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete object {}", id.get()))?;
        events.push(ChangeEvent::ObjectsRemoved(vec![object]));
        Ok(events)
    }

    pub fn remove_relationship_class(&self, id: RelationshipClassId) -> Result<Vec<ChangeEvent>> {
        let class = self
            .get_relationship_class(id)?
            .ok_or_else(|| anyhow!("relationship class {} not found", id.get()))?;
        let relationships: Vec<Relationship> = self
            .relationship_list()?
            .into_iter()
            .filter(|relationship| relationship.class_id == id)
            .collect();

        let mut events = Vec::new();
        for relationship in &relationships {
            events.extend(self.remove_relationship(relationship.id)?);
        }
        let definitions: Vec<ParameterDefinition> = self
            .parameter_definition_list()?
            .into_iter()
            .filter(|definition| definition.class == ClassRef::Relationship(id))
            .collect();
        for definition in &definitions {
            events.extend(self.remove_parameter_definition(definition.id)?);
        }
        self.conn
            .execute(
                "DELETE FROM relationship_classes WHERE id = ?",
                params![id.get()],
            )
            .with_context(|| format!("delete relationship class {}", id.get()))?;
        events.push(ChangeEvent::RelationshipClassesRemoved(vec![class]));
        Ok(events)
    }

    pub fn remove_relationship(&self, id: RelationshipId) -> Result<Vec<ChangeEvent>> {
        let relationship = self
            .get_relationship(id)?
            .ok_or_else(|| anyhow!("relationship {} not found", id.get()))?;
        let values: Vec<ParameterValue> = self
            .parameter_value_records()?
            .into_iter()
            .filter(|value| value.owner == OwnerRef::Relationship(id))
            .collect();

        let mut events = Vec::new();
        for value in &values {
            self.conn
                .execute(
                    "DELETE FROM parameter_values WHERE id = ?",
                    params![value.id.get()],
                )
                .with_context(|| format!("delete parameter value {}", value.id.get()))?;
        }
        if !values.is_empty() {
            events.push(ChangeEvent::ParameterValuesRemoved(values));
        }
        self.conn
            .execute("DELETE FROM relationships WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete relationship {}", id.get()))?;
        events.push(ChangeEvent::RelationshipsRemoved(vec![relationship]));
        Ok(events)
    }

    pub fn remove_parameter_definition(
        &self,
        id: ParameterDefinitionId,
    ) -> Result<Vec<ChangeEvent>> {
        let definition = self
            .get_parameter_definition(id)?
            .ok_or_else(|| anyhow!("parameter definition {} not found", id.get()))?;
        let values: Vec<ParameterValue> = self
            .parameter_value_records()?
            .into_iter()
            .filter(|value| value.definition_id == id)
            .collect();

        let mut events = Vec::new();
        self.conn
            .execute(
                "DELETE FROM parameter_values WHERE definition_id = ?",
                params![id.get()],
            )
            .with_context(|| format!("delete values of parameter definition {}", id.get()))?;
        if !values.is_empty() {
            events.push(ChangeEvent::ParameterValuesRemoved(values));
        }
        self.conn
            .execute(
                "DELETE FROM parameter_definition_tags WHERE definition_id = ?",
                params![id.get()],
            )
            .with_context(|| format!("delete tags of parameter definition {}", id.get()))?;
        self.conn
            .execute(
                "DELETE FROM parameter_definitions WHERE id = ?",
                params![id.get()],
            )
            .with_context(|| format!("delete parameter definition {}", id.get()))?;
        events.push(ChangeEvent::ParameterDefinitionsRemoved(vec![definition]));
        Ok(events)
    }

    pub fn remove_parameter_value(&self, id: ParameterValueId) -> Result<Vec<ChangeEvent>> {
        let value = self
            .parameter_value_records()?
            .into_iter()
            .find(|value| value.id == id)
            .ok_or_else(|| anyhow!("parameter value {} not found", id.get()))?;
        self.conn
            .execute("DELETE FROM parameter_values WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete parameter value {}", id.get()))?;
        Ok(vec![ChangeEvent::ParameterValuesRemoved(vec![value])])
    }

    pub fn remove_parameter_tag(&self, id: ParameterTagId) -> Result<Vec<ChangeEvent>> {
        self.conn
            .execute(
                "DELETE FROM parameter_definition_tags WHERE tag_id = ?",
                params![id.get()],
            )
            .with_context(|| format!("detach parameter tag {}", id.get()))?;
        let rows_affected = self
            .conn
            .execute("DELETE FROM parameter_tags WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete parameter tag {}", id.get()))?;
        if rows_affected == 0 {
            bail!("parameter tag {} not found -- refresh and retry", id.get());
        }
        Ok(vec![ChangeEvent::ParameterTagsRemoved(vec![id])])
    }

    pub fn remove_value_list(&self, id: ValueListId) -> Result<Vec<ChangeEvent>> {
        self.conn
            .execute(
                "UPDATE parameter_definitions SET value_list_id = NULL WHERE value_list_id = ?",
                params![id.get()],
            )
            .with_context(|| format!("detach value list {}", id.get()))?;
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM parameter_value_lists WHERE id = ?",
                params![id.get()],
            )
            .with_context(|| format!("delete value list {}", id.get()))?;
        if rows_affected == 0 {
            bail!("value list {} not found -- refresh and retry", id.get());
        }
        Ok(vec![ChangeEvent::ValueListsRemoved(vec![id])])
    }

    // ---- record lookups -------------------------------------------------

    pub fn get_object_class(&self, id: ObjectClassId) -> Result<Option<ObjectClass>> {
        self.conn
            .query_row(
                "SELECT id, name FROM object_classes WHERE id = ?",
                params![id.get()],
                |row| {
                    Ok(ObjectClass {
                        id: ObjectClassId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load object class {}", id.get()))
    }

    pub fn get_object(&self, id: ObjectId) -> Result<Option<EntityObject>> {
        self.conn
            .query_row(
                "SELECT id, class_id, name FROM objects WHERE id = ?",
                params![id.get()],
                |row| {
                    Ok(EntityObject {
                        id: ObjectId::new(row.get(0)?),
                        class_id: ObjectClassId::new(row.get(1)?),
                        name: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load object {}", id.get()))
    }

    pub fn get_relationship_class(
        &self,
        id: RelationshipClassId,
    ) -> Result<Option<RelationshipClass>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, object_class_id_list FROM relationship_classes WHERE id = ?",
                params![id.get()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("load relationship class {}", id.get()))?;
        let Some((id, name, id_list)) = raw else {
            return Ok(None);
        };
        let member_ids = split_ids(&id_list).ok_or_else(|| {
            anyhow!("relationship class {id} has a malformed member class list {id_list:?}")
        })?;
        Ok(Some(RelationshipClass {
            id: RelationshipClassId::new(id),
            name,
            object_class_ids: member_ids.into_iter().map(ObjectClassId::new).collect(),
        }))
    }

    pub fn get_relationship(&self, id: RelationshipId) -> Result<Option<Relationship>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, class_id, name, object_id_list FROM relationships WHERE id = ?",
                params![id.get()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("load relationship {}", id.get()))?;
        let Some((id, class_id, name, id_list)) = raw else {
            return Ok(None);
        };
        let member_ids = split_ids(&id_list)
            .ok_or_else(|| anyhow!("relationship {id} has a malformed member list {id_list:?}"))?;
        Ok(Some(Relationship {
            id: RelationshipId::new(id),
            class_id: RelationshipClassId::new(class_id),
            name,
            object_ids: member_ids.into_iter().map(ObjectId::new).collect(),
        }))
    }

    pub fn get_parameter_definition(
        &self,
        id: ParameterDefinitionId,
    ) -> Result<Option<ParameterDefinition>> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT id, object_class_id, relationship_class_id, name, default_value, value_list_id
                FROM parameter_definitions
                WHERE id = ?
                ",
                params![id.get()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("load parameter definition {}", id.get()))?;
        let Some((id, object_class_id, relationship_class_id, name, default_value, value_list_id)) =
            raw
        else {
            return Ok(None);
        };
        let class = class_ref(id, object_class_id, relationship_class_id)?;
        let tag_ids = self.definition_tag_ids(id)?;
        Ok(Some(ParameterDefinition {
            id: ParameterDefinitionId::new(id),
            class,
            name,
            default_value,
            value_list_id: value_list_id.map(ValueListId::new),
            tag_ids,
        }))
    }

    // ---- internal helpers ----------------------------------------------

    fn name_taken(&self, table: &str, name: &str) -> Result<bool> {
        self.conn
            .query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE name = ?)"),
                params![name],
                |row| row.get(0),
            )
            .with_context(|| format!("check name uniqueness in {table}"))
    }

    fn definition_tag_ids(&self, definition_id: i64) -> Result<Vec<ParameterTagId>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT tag_id FROM parameter_definition_tags
                WHERE definition_id = ?
                ORDER BY position ASC
                ",
            )
            .context("prepare definition tags query")?;
        let rows = stmt
            .query_map(params![definition_id], |row| {
                Ok(ParameterTagId::new(row.get(0)?))
            })
            .context("query definition tags")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect definition tags")
    }

    fn tag_ids_by_definition(&self) -> Result<BTreeMap<i64, Vec<ParameterTagId>>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT definition_id, tag_id FROM parameter_definition_tags
                ORDER BY definition_id ASC, position ASC
                ",
            )
            .context("prepare definition tag map query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
            .context("query definition tag map")?;
        let mut map: BTreeMap<i64, Vec<ParameterTagId>> = BTreeMap::new();
        for row in rows {
            let (definition_id, tag_id) = row.context("read definition tag row")?;
            map.entry(definition_id)
                .or_default()
                .push(ParameterTagId::new(tag_id));
        }
        Ok(map)
    }

    fn replace_definition_tags(
        &self,
        definition_id: ParameterDefinitionId,
        tag_ids: &[ParameterTagId],
    ) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM parameter_definition_tags WHERE definition_id = ?",
                params![definition_id.get()],
            )
            .with_context(|| format!("clear tags of definition {}", definition_id.get()))?;
        for (position, tag_id) in tag_ids.iter().enumerate() {
            self.conn
                .execute(
                    "
                    INSERT INTO parameter_definition_tags (definition_id, tag_id, position)
                    VALUES (?, ?, ?)
                    ",
                    params![definition_id.get(), tag_id.get(), position as i64],
                )
                .with_context(|| format!("attach tag {} to definition", tag_id.get()))?;
        }
        Ok(())
    }
}

fn class_ref(
    definition_id: i64,
    object_class_id: Option<i64>,
    relationship_class_id: Option<i64>,
) -> Result<ClassRef> {
    match (object_class_id, relationship_class_id) {
        (Some(id), None) => Ok(ClassRef::Object(ObjectClassId::new(id))),
        (None, Some(id)) => Ok(ClassRef::Relationship(RelationshipClassId::new(id))),
        _ => bail!("parameter definition {definition_id} has an inconsistent class reference"),
    }
}

fn owner_ref(
    value_id: i64,
    object_id: Option<i64>,
    relationship_id: Option<i64>,
) -> Result<OwnerRef> {
    match (object_id, relationship_id) {
        (Some(id), None) => Ok(OwnerRef::Object(ObjectId::new(id))),
        (None, Some(id)) => Ok(OwnerRef::Relationship(RelationshipId::new(id))),
        _ => bail!("parameter value {value_id} has an inconsistent owner reference"),
    }
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a tabula-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get(0),
        )
        .with_context(|| format!("check table `{table}` existence"))?;
    Ok(exists)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("prepare column listing for `{table}`"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("list columns of `{table}`"))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns of `{table}`"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}
