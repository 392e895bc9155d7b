// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tabula_engine::{
    CellEdit, CompositeTable, NewParameterValue, ParameterValueUpdate,
};
use tabula_model::{
    Cell, ChangeEvent, OwnerRef, TableKind, object_definition as opd, object_value as opv,
    relationship_value as rpv,
};
use tabula_store::{NewObject, NewObjectClass, Store, validate_db_path};
use tabula_testkit::{
    definition_id, loaded_table, memory_store, object_class_id, object_id, relationship_class_id,
    seeded_store,
};

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/tabula.db").is_ok());
}

#[test]
fn bootstrap_creates_schema_and_is_idempotent() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.bootstrap()?;

    assert!(store.object_class_list()?.is_empty());
    assert!(store.parameter_definition_list()?.is_empty());
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.raw_connection().execute_batch(
        "
        ALTER TABLE objects RENAME TO objects_old;
        CREATE TABLE objects (
          id INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        DROP TABLE objects_old;
        ",
    )?;

    let err = store.bootstrap().expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `objects` is missing required columns"));
    assert!(message.contains("class_id"));
    Ok(())
}

#[test]
fn on_disk_store_round_trip() -> Result<()> {
    let (dir, path) = tabula_testkit::temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        let added = store.add_object_classes(&[NewObjectClass {
            name: "fish".to_owned(),
        }])?;
        assert!(added.errors.is_empty());
    }
    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(store.object_class_list()?.len(), 1);
    drop(dir);
    Ok(())
}

#[test]
fn seeded_catalog_listings() -> Result<()> {
    let store = seeded_store()?;

    let classes = store.object_class_list()?;
    assert_eq!(
        classes.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["dog", "fish"]
    );

    let relationship_classes = store.relationship_class_list()?;
    assert_eq!(relationship_classes.len(), 1);
    let fish = object_class_id(&store, "fish")?;
    let dog = object_class_id(&store, "dog")?;
    assert_eq!(
        relationship_classes[0].object_class_ids,
        vec![fish, dog]
    );

    let definitions = store.parameter_definition_list()?;
    assert_eq!(definitions.len(), 3);
    let breed = definitions
        .iter()
        .find(|definition| definition.name == "breed")
        .expect("breed definition");
    assert_eq!(breed.tag_ids.len(), 1);
    assert_eq!(breed.default_value.as_deref(), Some("labrador"));

    let value_lists = store.value_list_list()?;
    assert_eq!(value_lists.len(), 1);
    assert_eq!(value_lists[0].values, vec!["salt", "fresh"]);
    Ok(())
}

#[test]
fn add_objects_isolates_per_item_failures() -> Result<()> {
    let store = seeded_store()?;
    let dog = object_class_id(&store, "dog")?;

    let outcome = store.add_objects(&[
        NewObject {
            class_id: dog,
            name: "goofy".to_owned(),
        },
        NewObject {
            class_id: dog,
            name: "pluto".to_owned(),
        },
    ])?;

    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].name, "goofy");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("already an object called 'pluto'"));
    // The failed sibling did not roll back the accepted one.
    assert!(store.object_list()?.iter().any(|o| o.name == "goofy"));
    Ok(())
}

#[test]
fn add_parameter_values_validates_owner_and_uniqueness() -> Result<()> {
    let store = seeded_store()?;
    let breed = definition_id(&store, "breed")?;
    let nemo = object_id(&store, "nemo")?;
    let pluto = object_id(&store, "pluto")?;

    let outcome = store.add_parameter_values(&[
        // breed is a dog parameter; nemo is a fish.
        NewParameterValue {
            definition_id: breed,
            owner: OwnerRef::Object(nemo),
            value: Some("clown".to_owned()),
        },
        // pluto already has a breed value from the seed.
        NewParameterValue {
            definition_id: breed,
            owner: OwnerRef::Object(pluto),
            value: Some("beagle".to_owned()),
        },
    ])?;

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.errors.len(), 2);
    assert!(outcome.errors[0].contains("not defined for the class of 'nemo'"));
    assert!(outcome.errors[1].contains("already a value for parameter 'breed'"));
    Ok(())
}

#[test]
fn update_parameter_values_reports_missing_ids() -> Result<()> {
    let store = seeded_store()?;

    let outcome = store.update_parameter_values(&[ParameterValueUpdate {
        id: 9999.into(),
        value: Some("x".to_owned()),
    }])?;

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.errors, vec!["Parameter value 9999 not found".to_owned()]);
    Ok(())
}

#[test]
fn object_value_rows_align_to_header() -> Result<()> {
    let store = seeded_store()?;
    let rows = store.table_rows(TableKind::ObjectParameterValue)?;
    let header_len = TableKind::ObjectParameterValue.header().len();

    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.len(), header_len);
        assert_eq!(row[opv::OBJECT_CLASS_NAME], Cell::text("dog"));
        assert_eq!(row[opv::PARAMETER_NAME], Cell::text("breed"));
        assert!(row[opv::ID].as_id().is_some());
    }
    Ok(())
}

#[test]
fn relationship_value_rows_carry_denormalized_name_lists() -> Result<()> {
    let store = seeded_store()?;
    let rows = store.table_rows(TableKind::RelationshipParameterValue)?;

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[rpv::RELATIONSHIP_CLASS_NAME], Cell::text("fish__dog"));
    assert_eq!(row[rpv::OBJECT_CLASS_NAME_LIST], Cell::text("fish,dog"));
    assert_eq!(row[rpv::OBJECT_NAME_LIST], Cell::text("nemo,pluto"));
    assert_eq!(row[rpv::PARAMETER_NAME], Cell::text("relative_speed"));
    assert_eq!(row[rpv::VALUE], Cell::text("-1"));
    Ok(())
}

#[test]
fn definition_rows_carry_tag_and_value_list_columns() -> Result<()> {
    let store = seeded_store()?;
    let rows = store.table_rows(TableKind::ObjectParameterDefinition)?;

    let water = rows
        .iter()
        .find(|row| row[opd::PARAMETER_NAME] == Cell::text("water"))
        .expect("water definition row");
    assert_eq!(water[opd::VALUE_LIST_NAME], Cell::text("water_types"));

    let breed = rows
        .iter()
        .find(|row| row[opd::PARAMETER_NAME] == Cell::text("breed"))
        .expect("breed definition row");
    assert_eq!(breed[opd::PARAMETER_TAG_LIST], Cell::text("mandatory"));
    assert!(breed[opd::PARAMETER_TAG_ID_LIST].as_text().is_some());
    Ok(())
}

#[test]
fn remove_object_cascades_to_relationships_and_values() -> Result<()> {
    let store = seeded_store()?;
    let pluto = object_id(&store, "pluto")?;

    let events = store.remove_object(pluto)?;

    // Dependent relationship, its value, pluto's own value, then pluto.
    assert!(events.iter().any(|event| matches!(
        event,
        ChangeEvent::RelationshipsRemoved(items) if items.len() == 1
    )));
    let removed_value_count: usize = events
        .iter()
        .filter_map(|event| match event {
            ChangeEvent::ParameterValuesRemoved(items) => Some(items.len()),
            _ => None,
        })
        .sum();
    assert_eq!(removed_value_count, 2);
    assert!(matches!(
        events.last(),
        Some(ChangeEvent::ObjectsRemoved(items)) if items[0].name == "pluto"
    ));

    assert!(store.relationship_list()?.is_empty());
    assert!(
        store
            .table_rows(TableKind::RelationshipParameterValue)?
            .is_empty()
    );
    Ok(())
}

#[test]
fn remove_object_class_cascades_to_member_relationship_classes() -> Result<()> {
    let store = seeded_store()?;
    let dog = object_class_id(&store, "dog")?;

    let events = store.remove_object_class(dog)?;

    assert!(events.iter().any(|event| matches!(
        event,
        ChangeEvent::RelationshipClassesRemoved(items) if items[0].name == "fish__dog"
    )));
    assert!(matches!(
        events.last(),
        Some(ChangeEvent::ObjectClassesRemoved(items)) if items[0].name == "dog"
    ));
    assert!(store.relationship_class_list()?.is_empty());
    // The fish side of the catalog survives.
    assert_eq!(store.object_class_list()?.len(), 1);
    assert!(
        store
            .parameter_definition_list()?
            .iter()
            .all(|definition| definition.name == "water")
    );
    Ok(())
}

#[test]
fn remove_value_list_detaches_definitions() -> Result<()> {
    let store = seeded_store()?;
    let value_lists = store.value_list_list()?;
    let water_types = value_lists[0].id;

    store.remove_value_list(water_types)?;

    assert!(store.value_list_list()?.is_empty());
    assert!(
        store
            .parameter_definition_list()?
            .iter()
            .all(|definition| definition.value_list_id.is_none())
    );
    Ok(())
}

#[test]
fn rename_events_carry_full_records() -> Result<()> {
    let store = seeded_store()?;
    let nemo = object_id(&store, "nemo")?;

    let event = store.rename_object(nemo, "marlin")?;
    let ChangeEvent::ObjectsUpdated(objects) = &event else {
        panic!("expected an objects-updated event");
    };
    assert_eq!(objects[0].name, "marlin");
    assert_eq!(objects[0].id, nemo);

    let error = store
        .rename_object(9999.into(), "ghost")
        .expect_err("unknown object rename should fail");
    assert!(error.to_string().contains("not found"));
    Ok(())
}

// ---- engine-over-store scenarios ---------------------------------------

#[test]
fn promotion_round_trip_against_real_store() -> Result<()> {
    let store = seeded_store()?;
    let mut table = loaded_table(&store, TableKind::ObjectParameterValue)?;
    let staging_row = table.row_count() - 1;

    let report = table.set_values(
        &store,
        &[
            CellEdit::new(staging_row, opv::OBJECT_CLASS_NAME, "fish"),
            CellEdit::new(staging_row, opv::OBJECT_NAME, "nemo"),
            CellEdit::new(staging_row, opv::PARAMETER_NAME, "water"),
            CellEdit::new(staging_row, opv::VALUE, "salt"),
        ],
    )?;

    assert!(report.accepted);
    assert_eq!(report.added, 1);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let fish = object_class_id(&store, "fish")?;
    let sub = table.sub_table(fish.get()).expect("fish backing table");
    assert_eq!(sub.backing().row_count(), 1);
    let row = sub.backing().row(0).expect("promoted row");
    assert_eq!(row[opv::VALUE], Cell::text("salt"));
    let assigned = row[opv::ID].as_id().expect("assigned id");

    // The store observed the same commit.
    let stored = store
        .table_rows(TableKind::ObjectParameterValue)?
        .into_iter()
        .find(|stored| stored[opv::ID] == Cell::Id(assigned))
        .expect("stored row");
    assert_eq!(stored[opv::OBJECT_NAME], Cell::text("nemo"));
    assert_eq!(table.staging().row_count(), 1);
    assert!(table.staging().is_default_row(0));
    Ok(())
}

#[test]
fn store_events_drive_rename_and_removal_cascades() -> Result<()> {
    let store = seeded_store()?;
    let mut object_table = loaded_table(&store, TableKind::ObjectParameterValue)?;
    let mut relationship_table = loaded_table(&store, TableKind::RelationshipParameterValue)?;

    let nemo = object_id(&store, "nemo")?;
    let rename = store.rename_object(nemo, "marlin")?;
    object_table.apply_event(&rename);
    relationship_table.apply_event(&rename);

    let fish_dog = relationship_class_id(&store, "fish__dog")?;
    let sub = relationship_table
        .sub_table(fish_dog.get())
        .expect("relationship sub-table");
    assert_eq!(
        sub.backing().row(0).expect("relationship row")[rpv::OBJECT_NAME_LIST],
        Cell::text("marlin,pluto")
    );

    let pluto = object_id(&store, "pluto")?;
    for event in store.remove_object(pluto)? {
        object_table.apply_event(&event);
        relationship_table.apply_event(&event);
    }

    let dog = object_class_id(&store, "dog")?;
    let dog_sub = object_table.sub_table(dog.get()).expect("dog sub-table");
    assert_eq!(dog_sub.backing().row_count(), 1);
    let sub = relationship_table
        .sub_table(fish_dog.get())
        .expect("relationship sub-table");
    assert_eq!(sub.backing().row_count(), 0);
    Ok(())
}

#[test]
fn committed_edit_round_trips_through_store() -> Result<()> {
    let store = seeded_store()?;
    let mut table = loaded_table(&store, TableKind::ObjectParameterValue)?;

    let pluto = object_id(&store, "pluto")?;
    let pluto_row = (0..table.row_count())
        .find(|row| table.value_at(*row, opv::OBJECT_ID) == Some(&Cell::Id(pluto.get())))
        .expect("pluto row");

    let report = table.set_values(&store, &[CellEdit::new(pluto_row, opv::VALUE, "beagle")])?;
    assert_eq!(report.updated, 1);
    assert!(report.errors.is_empty());

    let fresh = loaded_table(&store, TableKind::ObjectParameterValue)?;
    let refreshed_row = (0..fresh.row_count())
        .find(|row| fresh.value_at(*row, opv::OBJECT_ID) == Some(&Cell::Id(pluto.get())))
        .expect("pluto row after reload");
    assert_eq!(
        fresh.value_at(refreshed_row, opv::VALUE),
        Some(&Cell::text("beagle"))
    );
    Ok(())
}

#[test]
fn definition_promotion_round_trip_against_real_store() -> Result<()> {
    let store = seeded_store()?;
    let mut table = loaded_table(&store, TableKind::ObjectParameterDefinition)?;
    let staging_row = table.row_count() - 1;

    let report = table.set_values(
        &store,
        &[
            CellEdit::new(staging_row, opd::OBJECT_CLASS_NAME, "fish"),
            CellEdit::new(staging_row, opd::PARAMETER_NAME, "length"),
            CellEdit::new(staging_row, opd::PARAMETER_TAG_LIST, "design"),
            CellEdit::new(staging_row, opd::DEFAULT_VALUE, "10"),
        ],
    )?;

    assert!(report.accepted);
    assert_eq!(report.added, 1);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let fish = object_class_id(&store, "fish")?;
    let sub = table.sub_table(fish.get()).expect("fish definition table");
    let row = sub
        .backing()
        .rows()
        .iter()
        .find(|row| row[opd::PARAMETER_NAME] == Cell::text("length"))
        .expect("promoted definition row");
    assert!(row[opd::ID].as_id().is_some());
    assert!(row[opd::PARAMETER_TAG_ID_LIST].as_text().is_some());
    assert_eq!(row[opd::DEFAULT_VALUE], Cell::text("10"));

    let stored = store
        .parameter_definition_list()?
        .into_iter()
        .find(|definition| definition.name == "length")
        .expect("stored definition");
    assert_eq!(stored.default_value.as_deref(), Some("10"));
    assert_eq!(stored.tag_ids.len(), 1);
    assert_eq!(table.staging().row_count(), 1);
    Ok(())
}

#[test]
fn definition_edit_resolves_tag_list_and_updates_store() -> Result<()> {
    let store = seeded_store()?;
    let mut table = loaded_table(&store, TableKind::ObjectParameterDefinition)?;

    let breed_row = (0..table.row_count())
        .find(|row| table.value_at(*row, opd::PARAMETER_NAME) == Some(&Cell::text("breed")))
        .expect("breed definition row");

    let report = table.set_values(
        &store,
        &[
            CellEdit::new(breed_row, opd::PARAMETER_NAME, "pedigree"),
            CellEdit::new(breed_row, opd::PARAMETER_TAG_LIST, "design"),
        ],
    )?;

    assert!(report.accepted);
    assert_eq!(report.updated, 1);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(
        table.value_at(breed_row, opd::PARAMETER_NAME),
        Some(&Cell::text("pedigree"))
    );

    let stored = store
        .parameter_definition_list()?
        .into_iter()
        .find(|definition| definition.name == "pedigree")
        .expect("renamed definition");
    let design_tag = store
        .parameter_tag_list()?
        .into_iter()
        .find(|tag| tag.tag == "design")
        .expect("design tag");
    assert_eq!(stored.tag_ids, vec![design_tag.id]);
    Ok(())
}

#[test]
fn unknown_tag_in_definition_edit_is_a_resolution_error() -> Result<()> {
    let store = seeded_store()?;
    let mut table = loaded_table(&store, TableKind::ObjectParameterDefinition)?;

    let breed_row = (0..table.row_count())
        .find(|row| table.value_at(*row, opd::PARAMETER_NAME) == Some(&Cell::text("breed")))
        .expect("breed definition row");

    let report = table.set_values(
        &store,
        &[CellEdit::new(breed_row, opd::PARAMETER_TAG_LIST, "bogus")],
    )?;

    assert!(report.accepted);
    assert_eq!(report.updated, 0);
    assert_eq!(report.errors, vec!["Invalid parameter tag 'bogus'".to_owned()]);
    // The typed tag list was not applied to the committed row.
    assert_eq!(
        table.value_at(breed_row, opd::PARAMETER_TAG_LIST),
        Some(&Cell::text("mandatory"))
    );
    Ok(())
}

#[test]
fn empty_store_loads_empty_tables() -> Result<()> {
    let store = memory_store()?;
    let table: CompositeTable = loaded_table(&store, TableKind::ObjectParameterValue)?;
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.class_ids().count(), 0);
    Ok(())
}
