// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::params;
use std::collections::BTreeMap;
use tabula_engine::{
    Backend, NewParameterDefinition, NewParameterValue, NewRelationship,
    ParameterDefinitionUpdate, ParameterValueUpdate, Upserted,
};
use tabula_model::{
    Cell, ClassRef, EntityObject, ObjectClass, OwnerRef, ParameterDefinition, ParameterTag,
    ParameterTagId, ParameterValue, ParameterValueId, ParameterValueList, Relationship,
    RelationshipClass, RelationshipId, TableKind, join_ids,
};

use crate::{
    NewObject, NewObjectClass, NewParameterTag, NewRelationshipClass, NewValueList, Store,
    now_rfc3339,
};

const DEMO_OBJECT_CLASSES: [&str; 2] = ["fish", "dog"];
const DEMO_RELATIONSHIP_CLASS: &str = "fish__dog";
const DEMO_PARAMETER_TAGS: [&str; 2] = ["mandatory", "design"];
const DEMO_VALUE_LIST: (&str, [&str; 2]) = ("water_types", ["salt", "fresh"]);

impl Store {
    /// Populate the demo aquarium/kennel catalog: two object classes,
    /// three objects, one relationship class with one relationship,
    /// tags, a value list, three parameter definitions and a couple of
    /// committed values. The "water" parameter of "nemo" is left unset
    /// so staging scenarios can create it.
    pub fn seed_demo_catalog(&self) -> Result<()> {
        let classes = self.add_object_classes(
            &DEMO_OBJECT_CLASSES
                .iter()
                .map(|name| NewObjectClass {
                    name: (*name).to_owned(),
                })
                .collect::<Vec<_>>(),
        )?;
        seed_clean("object classes", &classes.errors)?;
        let fish = seed_find(&classes.items, |class| class.name == "fish", "fish")?;
        let dog = seed_find(&classes.items, |class| class.name == "dog", "dog")?;

        let objects = self.add_objects(&[
            NewObject {
                class_id: fish.id,
                name: "nemo".to_owned(),
            },
            NewObject {
                class_id: dog.id,
                name: "pluto".to_owned(),
            },
            NewObject {
                class_id: dog.id,
                name: "scrooge".to_owned(),
            },
        ])?;
        seed_clean("objects", &objects.errors)?;
        let nemo = seed_find(&objects.items, |object| object.name == "nemo", "nemo")?;
        let pluto = seed_find(&objects.items, |object| object.name == "pluto", "pluto")?;
        let scrooge = seed_find(&objects.items, |object| object.name == "scrooge", "scrooge")?;

        let relationship_classes = self.add_relationship_classes(&[NewRelationshipClass {
            name: DEMO_RELATIONSHIP_CLASS.to_owned(),
            object_class_ids: vec![fish.id, dog.id],
        }])?;
        seed_clean("relationship classes", &relationship_classes.errors)?;
        let fish_dog = relationship_classes.items[0].clone();

        let relationships = self.add_relationships(&[NewRelationship {
            class_id: fish_dog.id,
            name: "fish__dog_nemo__pluto".to_owned(),
            object_ids: vec![nemo.id, pluto.id],
        }])?;
        seed_clean("relationships", &relationships.errors)?;

        let tags = self.add_parameter_tags(
            &DEMO_PARAMETER_TAGS
                .iter()
                .map(|tag| NewParameterTag {
                    tag: (*tag).to_owned(),
                })
                .collect::<Vec<_>>(),
        )?;
        seed_clean("parameter tags", &tags.errors)?;
        let mandatory = seed_find(&tags.items, |tag| tag.tag == "mandatory", "mandatory")?;

        let (list_name, list_values) = DEMO_VALUE_LIST;
        let value_lists = self.add_value_lists(&[NewValueList {
            name: list_name.to_owned(),
            values: list_values.iter().map(|value| (*value).to_owned()).collect(),
        }])?;
        seed_clean("value lists", &value_lists.errors)?;
        let water_types = value_lists.items[0].clone();

        let definitions = self.add_parameter_definitions(&[
            NewParameterDefinition {
                class: ClassRef::Object(fish.id),
                name: "water".to_owned(),
                default_value: None,
                value_list_id: Some(water_types.id),
                tag_ids: Vec::new(),
            },
            NewParameterDefinition {
                class: ClassRef::Object(dog.id),
                name: "breed".to_owned(),
                default_value: Some("labrador".to_owned()),
                value_list_id: None,
                tag_ids: vec![mandatory.id],
            },
            NewParameterDefinition {
                class: ClassRef::Relationship(fish_dog.id),
                name: "relative_speed".to_owned(),
                default_value: None,
                value_list_id: None,
                tag_ids: Vec::new(),
            },
        ])?;
        seed_clean("parameter definitions", &definitions.errors)?;
        let breed = seed_find(
            &definitions.items,
            |definition| definition.name == "breed",
            "breed",
        )?;
        let relative_speed = seed_find(
            &definitions.items,
            |definition| definition.name == "relative_speed",
            "relative_speed",
        )?;

        let values = self.add_parameter_values(&[
            NewParameterValue {
                definition_id: breed.id,
                owner: OwnerRef::Object(pluto.id),
                value: Some("labrador".to_owned()),
            },
            NewParameterValue {
                definition_id: breed.id,
                owner: OwnerRef::Object(scrooge.id),
                value: Some("dachshund".to_owned()),
            },
            NewParameterValue {
                definition_id: relative_speed.id,
                owner: OwnerRef::Relationship(relationships.items[0].id),
                value: Some("-1".to_owned()),
            },
        ])?;
        seed_clean("parameter values", &values.errors)?;
        Ok(())
    }
    /// Add relationships one item at a time; a rejected item (unknown
    /// class, wrong member arity or classes, duplicate member tuple)
    /// never affects its batch siblings.
    pub fn add_relationships(&self, items: &[NewRelationship]) -> Result<Upserted<Relationship>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            let Some(class) = self.get_relationship_class(item.class_id)? else {
                outcome
                    .errors
                    .push(format!("Unknown relationship class {}", item.class_id.get()));
                continue;
            };
            if item.object_ids.len() != class.object_class_ids.len() {
                outcome.errors.push(format!(
                    "Relationship '{}' needs {} members, got {}",
                    item.name,
                    class.object_class_ids.len(),
                    item.object_ids.len()
                ));
                continue;
            }
            let mut member_error = None;
            for (position, object_id) in item.object_ids.iter().enumerate() {
                match self.get_object(*object_id)? {
                    None => {
                        member_error = Some(format!("Unknown object {}", object_id.get()));
                        break;
                    }
                    Some(object) if object.class_id != class.object_class_ids[position] => {
                        member_error = Some(format!(
                            "Object '{}' is not of the expected class for member {}",
                            object.name,
                            position + 1
                        ));
                        break;
                    }
                    Some(_) => {}
                }
            }
            if let Some(message) = member_error {
                outcome.errors.push(message);
                continue;
            }
            let id_list = join_ids(item.object_ids.iter().map(|id| id.get()));
            let taken: bool = self
                .conn
                .query_row(
                    "
                    SELECT EXISTS(
                      SELECT 1 FROM relationships WHERE class_id = ? AND object_id_list = ?
                    )
                    ",
                    params![item.class_id.get(), id_list],
                    |row| row.get(0),
                )
                .context("check relationship uniqueness")?;
            if taken {
                outcome.errors.push(format!(
                    "There's already a relationship between those objects in class '{}'",
                    class.name
                ));
                continue;
            }
            self.conn
                .execute(
                    "
                    INSERT INTO relationships (class_id, name, object_id_list, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ",
                    params![item.class_id.get(), item.name, id_list, now, now],
                )
                .with_context(|| format!("insert relationship {}", item.name))?;
            outcome.items.push(Relationship {
                id: RelationshipId::new(self.conn.last_insert_rowid()),
                class_id: item.class_id,
                name: item.name.clone(),
                object_ids: item.object_ids.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn add_parameter_values(
        &self,
        items: &[NewParameterValue],
    ) -> Result<Upserted<ParameterValue>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            let Some(definition) = self.get_parameter_definition(item.definition_id)? else {
                outcome.errors.push(format!(
                    "Unknown parameter definition {}",
                    item.definition_id.get()
                ));
                continue;
            };
            let owner_check = self.check_value_owner(&definition, item.owner)?;
            if let Err(message) = owner_check {
                outcome.errors.push(message);
                continue;
            }
            let (object_id, relationship_id) = match item.owner {
                OwnerRef::Object(id) => (Some(id.get()), None),
                OwnerRef::Relationship(id) => (None, Some(id.get())),
            };
            let taken: bool = self
                .conn
                .query_row(
                    "
                    SELECT EXISTS(
                      SELECT 1 FROM parameter_values
                      WHERE definition_id = ?
                        AND IFNULL(object_id, 0) = IFNULL(?, 0)
                        AND IFNULL(relationship_id, 0) = IFNULL(?, 0)
                    )
                    ",
                    params![item.definition_id.get(), object_id, relationship_id],
                    |row| row.get(0),
                )
                .context("check parameter value uniqueness")?;
            if taken {
                outcome.errors.push(format!(
                    "There's already a value for parameter '{}' on that entity",
                    definition.name
                ));
                continue;
            }
            self.conn
                .execute(
                    "
                    INSERT INTO parameter_values (definition_id, object_id, relationship_id, value, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ",
                    params![
                        item.definition_id.get(),
                        object_id,
                        relationship_id,
                        item.value,
                        now,
                        now,
                    ],
                )
                .with_context(|| format!("insert value of parameter {}", definition.name))?;
            outcome.items.push(ParameterValue {
                id: ParameterValueId::new(self.conn.last_insert_rowid()),
                definition_id: item.definition_id,
                owner: item.owner,
                value: item.value.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn update_parameter_values(
        &self,
        items: &[ParameterValueUpdate],
    ) -> Result<Upserted<ParameterValue>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            let rows_affected = self
                .conn
                .execute(
                    "UPDATE parameter_values SET value = ?, updated_at = ? WHERE id = ?",
                    params![item.value, now, item.id.get()],
                )
                .with_context(|| format!("update parameter value {}", item.id.get()))?;
            if rows_affected == 0 {
                outcome
                    .errors
                    .push(format!("Parameter value {} not found", item.id.get()));
                continue;
            }
            let updated = self
                .parameter_value_records()?
                .into_iter()
                .find(|value| value.id == item.id);
            if let Some(updated) = updated {
                outcome.items.push(updated);
            }
        }
        Ok(outcome)
    }

    pub fn add_parameter_definitions(
        &self,
        items: &[NewParameterDefinition],
    ) -> Result<Upserted<ParameterDefinition>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            if item.name.trim().is_empty() {
                outcome.errors.push("Parameter name is required".to_owned());
                continue;
            }
            let (object_class_id, relationship_class_id) = match item.class {
                ClassRef::Object(id) => {
                    if self.get_object_class(id)?.is_none() {
                        outcome
                            .errors
                            .push(format!("Unknown object class {}", id.get()));
                        continue;
                    }
                    (Some(id.get()), None)
                }
                ClassRef::Relationship(id) => {
                    if self.get_relationship_class(id)?.is_none() {
                        outcome
                            .errors
                            .push(format!("Unknown relationship class {}", id.get()));
                        continue;
                    }
                    (None, Some(id.get()))
                }
            };
            let taken: bool = self
                .conn
                .query_row(
                    "
                    SELECT EXISTS(
                      SELECT 1 FROM parameter_definitions
                      WHERE IFNULL(object_class_id, 0) = IFNULL(?, 0)
                        AND IFNULL(relationship_class_id, 0) = IFNULL(?, 0)
                        AND name = ?
                    )
                    ",
                    params![object_class_id, relationship_class_id, item.name],
                    |row| row.get(0),
                )
                .context("check parameter definition uniqueness")?;
            if taken {
                outcome.errors.push(format!(
                    "There's already a parameter called '{}' on that class",
                    item.name
                ));
                continue;
            }
            if let Some(value_list_id) = item.value_list_id {
                let known = self
                    .value_list_list()?
                    .iter()
                    .any(|list| list.id == value_list_id);
                if !known {
                    outcome
                        .errors
                        .push(format!("Unknown value list {}", value_list_id.get()));
                    continue;
                }
            }
            if let Some(tag_id) = self.first_unknown_tag(&item.tag_ids)? {
                outcome
                    .errors
                    .push(format!("Unknown parameter tag {}", tag_id.get()));
                continue;
            }
            self.conn
                .execute(
                    "
                    INSERT INTO parameter_definitions (
                      object_class_id, relationship_class_id, name, default_value,
                      value_list_id, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)
                    ",
                    params![
                        object_class_id,
                        relationship_class_id,
                        item.name,
                        item.default_value,
                        item.value_list_id.map(|id| id.get()),
                        now,
                        now,
                    ],
                )
                .with_context(|| format!("insert parameter definition {}", item.name))?;
            let definition_id = self.conn.last_insert_rowid();
            self.replace_definition_tags(definition_id.into(), &item.tag_ids)?;
            outcome.items.push(ParameterDefinition {
                id: definition_id.into(),
                class: item.class,
                name: item.name.clone(),
                default_value: item.default_value.clone(),
                value_list_id: item.value_list_id,
                tag_ids: item.tag_ids.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn update_parameter_definitions(
        &self,
        items: &[ParameterDefinitionUpdate],
    ) -> Result<Upserted<ParameterDefinition>> {
        let now = now_rfc3339()?;
        let mut outcome = Upserted::empty();
        for item in items {
            let Some(current) = self.get_parameter_definition(item.id)? else {
                outcome
                    .errors
                    .push(format!("Parameter definition {} not found", item.id.get()));
                continue;
            };
            let name = item.name.clone().unwrap_or_else(|| current.name.clone());
            if name.trim().is_empty() {
                outcome.errors.push("Parameter name is required".to_owned());
                continue;
            }
            let default_value = match &item.default_value {
                Some(new_default) => new_default.clone(),
                None => current.default_value.clone(),
            };
            let value_list_id = match item.value_list_id {
                Some(new_list) => new_list,
                None => current.value_list_id,
            };
            if let Some(list_id) = value_list_id
                && !self.value_list_list()?.iter().any(|list| list.id == list_id)
            {
                outcome
                    .errors
                    .push(format!("Unknown value list {}", list_id.get()));
                continue;
            }
            if let Some(tag_ids) = &item.tag_ids
                && let Some(tag_id) = self.first_unknown_tag(tag_ids)?
            {
                outcome
                    .errors
                    .push(format!("Unknown parameter tag {}", tag_id.get()));
                continue;
            }
            if name != current.name {
                let (object_class_id, relationship_class_id) = match current.class {
                    ClassRef::Object(id) => (Some(id.get()), None),
                    ClassRef::Relationship(id) => (None, Some(id.get())),
                };
                let taken: bool = self
                    .conn
                    .query_row(
                        "
                        SELECT EXISTS(
                          SELECT 1 FROM parameter_definitions
                          WHERE IFNULL(object_class_id, 0) = IFNULL(?, 0)
                            AND IFNULL(relationship_class_id, 0) = IFNULL(?, 0)
                            AND name = ?
                            AND id <> ?
                        )
                        ",
                        params![object_class_id, relationship_class_id, name, item.id.get()],
                        |row| row.get(0),
                    )
                    .context("check parameter definition rename uniqueness")?;
                if taken {
                    outcome.errors.push(format!(
                        "There's already a parameter called '{name}' on that class"
                    ));
                    continue;
                }
            }
            self.conn
                .execute(
                    "
                    UPDATE parameter_definitions
                    SET name = ?, default_value = ?, value_list_id = ?, updated_at = ?
                    WHERE id = ?
                    ",
                    params![
                        name,
                        default_value,
                        value_list_id.map(|id| id.get()),
                        now,
                        item.id.get(),
                    ],
                )
                .with_context(|| format!("update parameter definition {}", item.id.get()))?;
            if let Some(tag_ids) = &item.tag_ids {
                self.replace_definition_tags(item.id, tag_ids)?;
            }
            let updated = self
                .get_parameter_definition(item.id)?
                .ok_or_else(|| anyhow!("parameter definition {} vanished", item.id.get()))?;
            outcome.items.push(updated);
        }
        Ok(outcome)
    }

    /// Denormalized rows for one table kind, aligned to the kind's
    /// header.
    pub fn table_rows(&self, kind: TableKind) -> Result<Vec<Vec<Cell>>> {
        match kind {
            TableKind::ObjectParameterValue => self.object_value_rows(),
            TableKind::RelationshipParameterValue => self.relationship_value_rows(),
            TableKind::ObjectParameterDefinition => self.object_definition_rows(),
            TableKind::RelationshipParameterDefinition => self.relationship_definition_rows(),
        }
    }

    fn first_unknown_tag(
        &self,
        tag_ids: &[ParameterTagId],
    ) -> Result<Option<ParameterTagId>> {
        for tag_id in tag_ids {
            let known: bool = self
                .conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM parameter_tags WHERE id = ?)",
                    params![tag_id.get()],
                    |row| row.get(0),
                )
                .context("check parameter tag existence")?;
            if !known {
                return Ok(Some(*tag_id));
            }
        }
        Ok(None)
    }

    fn check_value_owner(
        &self,
        definition: &ParameterDefinition,
        owner: OwnerRef,
    ) -> Result<std::result::Result<(), String>> {
        match (definition.class, owner) {
            (ClassRef::Object(class_id), OwnerRef::Object(object_id)) => {
                let Some(object) = self.get_object(object_id)? else {
                    return Ok(Err(format!("Unknown object {}", object_id.get())));
                };
                if object.class_id != class_id {
                    return Ok(Err(format!(
                        "Parameter '{}' is not defined for the class of '{}'",
                        definition.name, object.name
                    )));
                }
                Ok(Ok(()))
            }
            (ClassRef::Relationship(class_id), OwnerRef::Relationship(relationship_id)) => {
                let Some(relationship) = self.get_relationship(relationship_id)? else {
                    return Ok(Err(format!(
                        "Unknown relationship {}",
                        relationship_id.get()
                    )));
                };
                if relationship.class_id != class_id {
                    return Ok(Err(format!(
                        "Parameter '{}' is not defined for the class of '{}'",
                        definition.name, relationship.name
                    )));
                }
                Ok(Ok(()))
            }
            _ => Ok(Err(format!(
                "Parameter '{}' does not apply to that kind of entity",
                definition.name
            ))),
        }
    }

    fn object_value_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT oc.id, oc.name, o.id, o.name, pd.id, pd.name, pv.value, pv.id
                FROM parameter_values pv
                JOIN objects o ON o.id = pv.object_id
                JOIN object_classes oc ON oc.id = o.class_id
                JOIN parameter_definitions pd ON pd.id = pv.definition_id
                WHERE pv.object_id IS NOT NULL
                ORDER BY oc.id ASC, pv.id ASC
                ",
            )
            .context("prepare object parameter value rows query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(vec![
                    Cell::Id(row.get(0)?),
                    Cell::Text(row.get(1)?),
                    Cell::Id(row.get(2)?),
                    Cell::Text(row.get(3)?),
                    Cell::Id(row.get(4)?),
                    Cell::Text(row.get(5)?),
                    optional_text(row.get(6)?),
                    Cell::Id(row.get(7)?),
                ])
            })
            .context("query object parameter value rows")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect object parameter value rows")
    }

    fn relationship_value_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let object_names = self.object_name_map()?;
        let class_names = self.object_class_name_map()?;
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT rc.id, rc.name, rc.object_class_id_list, r.id, r.object_id_list,
                       pd.id, pd.name, pv.value, pv.id
                FROM parameter_values pv
                JOIN relationships r ON r.id = pv.relationship_id
                JOIN relationship_classes rc ON rc.id = r.class_id
                JOIN parameter_definitions pd ON pd.id = pv.definition_id
                WHERE pv.relationship_id IS NOT NULL
                ORDER BY rc.id ASC, pv.id ASC
                ",
            )
            .context("prepare relationship parameter value rows query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, i64>(8)?,
                ))
            })
            .context("query relationship parameter value rows")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect relationship parameter value rows")?;

        Ok(raw
            .into_iter()
            .map(
                |(
                    class_id,
                    class_name,
                    class_id_list,
                    relationship_id,
                    object_id_list,
                    definition_id,
                    definition_name,
                    value,
                    value_id,
                )| {
                    vec![
                        Cell::Id(class_id),
                        Cell::Text(class_name),
                        Cell::list(&class_id_list),
                        Cell::text(joined_names(&class_id_list, &class_names)),
                        Cell::Id(relationship_id),
                        Cell::list(&object_id_list),
                        Cell::text(joined_names(&object_id_list, &object_names)),
                        Cell::Id(definition_id),
                        Cell::Text(definition_name),
                        optional_text(value),
                        Cell::Id(value_id),
                    ]
                },
            )
            .collect())
    }

    fn object_definition_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let tag_lists = self.definition_tag_lists()?;
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT oc.id, oc.name, pd.name, pd.value_list_id, vl.name, pd.default_value, pd.id
                FROM parameter_definitions pd
                JOIN object_classes oc ON oc.id = pd.object_class_id
                LEFT JOIN parameter_value_lists vl ON vl.id = pd.value_list_id
                WHERE pd.object_class_id IS NOT NULL
                ORDER BY oc.id ASC, pd.id ASC
                ",
            )
            .context("prepare object parameter definition rows query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .context("query object parameter definition rows")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect object parameter definition rows")?;

        Ok(raw
            .into_iter()
            .map(
                |(class_id, class_name, name, value_list_id, value_list_name, default_value, id)| {
                    let (tag_id_list, tag_list) =
                        tag_lists.get(&id).cloned().unwrap_or_default();
                    vec![
                        Cell::Id(class_id),
                        Cell::Text(class_name),
                        Cell::Text(name),
                        Cell::id_opt(value_list_id),
                        optional_text(value_list_name),
                        Cell::list(&tag_id_list),
                        Cell::list(&tag_list),
                        optional_text(default_value),
                        Cell::Id(id),
                    ]
                },
            )
            .collect())
    }

    fn relationship_definition_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let tag_lists = self.definition_tag_lists()?;
        let class_names = self.object_class_name_map()?;
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT rc.id, rc.name, rc.object_class_id_list, pd.name, pd.value_list_id,
                       vl.name, pd.default_value, pd.id
                FROM parameter_definitions pd
                JOIN relationship_classes rc ON rc.id = pd.relationship_class_id
                LEFT JOIN parameter_value_lists vl ON vl.id = pd.value_list_id
                WHERE pd.relationship_class_id IS NOT NULL
                ORDER BY rc.id ASC, pd.id ASC
                ",
            )
            .context("prepare relationship parameter definition rows query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .context("query relationship parameter definition rows")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect relationship parameter definition rows")?;

        Ok(raw
            .into_iter()
            .map(
                |(
                    class_id,
                    class_name,
                    class_id_list,
                    name,
                    value_list_id,
                    value_list_name,
                    default_value,
                    id,
                )| {
                    let (tag_id_list, tag_list) =
                        tag_lists.get(&id).cloned().unwrap_or_default();
                    vec![
                        Cell::Id(class_id),
                        Cell::Text(class_name),
                        Cell::list(&class_id_list),
                        Cell::text(joined_names(&class_id_list, &class_names)),
                        Cell::Text(name),
                        Cell::id_opt(value_list_id),
                        optional_text(value_list_name),
                        Cell::list(&tag_id_list),
                        Cell::list(&tag_list),
                        optional_text(default_value),
                        Cell::Id(id),
                    ]
                },
            )
            .collect())
    }

    fn object_name_map(&self) -> Result<BTreeMap<i64, String>> {
        Ok(self
            .object_list()?
            .into_iter()
            .map(|object| (object.id.get(), object.name))
            .collect())
    }

    fn object_class_name_map(&self) -> Result<BTreeMap<i64, String>> {
        Ok(self
            .object_class_list()?
            .into_iter()
            .map(|class| (class.id.get(), class.name))
            .collect())
    }

    /// (tag id list, tag list) display strings per definition, ordered
    /// by tag position.
    fn definition_tag_lists(&self) -> Result<BTreeMap<i64, (String, String)>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT dt.definition_id, dt.tag_id, pt.tag
                FROM parameter_definition_tags dt
                JOIN parameter_tags pt ON pt.id = dt.tag_id
                ORDER BY dt.definition_id ASC, dt.position ASC
                ",
            )
            .context("prepare definition tag lists query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("query definition tag lists")?;
        let mut map: BTreeMap<i64, (Vec<String>, Vec<String>)> = BTreeMap::new();
        for row in rows {
            let (definition_id, tag_id, tag) = row.context("read definition tag list row")?;
            let entry = map.entry(definition_id).or_default();
            entry.0.push(tag_id.to_string());
            entry.1.push(tag);
        }
        Ok(map
            .into_iter()
            .map(|(definition_id, (ids, tags))| (definition_id, (ids.join(","), tags.join(","))))
            .collect())
    }
}

fn seed_clean(stage: &str, errors: &[String]) -> Result<()> {
    if !errors.is_empty() {
        bail!("seeding {stage} failed: {}", errors.join("; "));
    }
    Ok(())
}

fn seed_find<T: Clone>(items: &[T], matches: impl Fn(&T) -> bool, label: &str) -> Result<T> {
    items
        .iter()
        .find(|item| matches(item))
        .cloned()
        .ok_or_else(|| anyhow!("seeded item '{label}' missing"))
}

fn optional_text(value: Option<String>) -> Cell {
    match value {
        Some(text) => Cell::Text(text),
        None => Cell::Empty,
    }
}

fn joined_names(id_list: &str, names: &BTreeMap<i64, String>) -> String {
    id_list
        .split(',')
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            piece
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl Backend for Store {
    fn object_class_list(&self) -> Result<Vec<ObjectClass>> {
        Store::object_class_list(self)
    }

    fn object_list(&self) -> Result<Vec<EntityObject>> {
        Store::object_list(self)
    }

    fn relationship_class_list(&self) -> Result<Vec<RelationshipClass>> {
        Store::relationship_class_list(self)
    }

    fn relationship_list(&self) -> Result<Vec<Relationship>> {
        Store::relationship_list(self)
    }

    fn parameter_definition_list(&self) -> Result<Vec<ParameterDefinition>> {
        Store::parameter_definition_list(self)
    }

    fn parameter_tag_list(&self) -> Result<Vec<ParameterTag>> {
        Store::parameter_tag_list(self)
    }

    fn value_list_list(&self) -> Result<Vec<ParameterValueList>> {
        Store::value_list_list(self)
    }

    fn table_rows(&self, kind: TableKind) -> Result<Vec<Vec<Cell>>> {
        Store::table_rows(self, kind)
    }

    fn add_relationships(&self, items: &[NewRelationship]) -> Result<Upserted<Relationship>> {
        Store::add_relationships(self, items)
    }

    fn add_parameter_values(&self, items: &[NewParameterValue]) -> Result<Upserted<ParameterValue>> {
        Store::add_parameter_values(self, items)
    }

    fn update_parameter_values(
        &self,
        items: &[ParameterValueUpdate],
    ) -> Result<Upserted<ParameterValue>> {
        Store::update_parameter_values(self, items)
    }

    fn add_parameter_definitions(
        &self,
        items: &[NewParameterDefinition],
    ) -> Result<Upserted<ParameterDefinition>> {
        Store::add_parameter_definitions(self, items)
    }

    fn update_parameter_definitions(
        &self,
        items: &[ParameterDefinitionUpdate],
    ) -> Result<Upserted<ParameterDefinition>> {
        Store::update_parameter_definitions(self, items)
    }
}
