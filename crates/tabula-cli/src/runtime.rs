// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tabula_engine::CompositeTable;
use tabula_model::TableKind;
use tabula_store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Seed,
    Classes,
    Show(TableKind),
}

pub fn execute(command: Command, store: &Store) -> Result<()> {
    match command {
        Command::Init => {
            println!("database initialized");
            Ok(())
        }
        Command::Seed => {
            store.seed_demo_catalog()?;
            println!("demo catalog seeded");
            Ok(())
        }
        Command::Classes => print_classes(store),
        Command::Show(kind) => print_table(store, kind),
    }
}

fn print_classes(store: &Store) -> Result<()> {
    for class in store.object_class_list()? {
        println!("object class {}: {}", class.id.get(), class.name);
    }
    for class in store.relationship_class_list()? {
        println!(
            "relationship class {}: {} ({})",
            class.id.get(),
            class.name,
            class.object_class_id_list()
        );
    }
    Ok(())
}

fn print_table(store: &Store, kind: TableKind) -> Result<()> {
    let mut table = CompositeTable::new(kind);
    table.reset_from_backend(store)?;

    let header = table.header();
    let shown: Vec<usize> = (0..header.len())
        .filter(|column| !header.columns[*column].hidden)
        .collect();
    let names: Vec<&str> = shown
        .iter()
        .filter_map(|column| header.name_of(*column))
        .collect();
    println!("{}", names.join("\t"));

    // The trailing row is the staging table's empty entry row.
    for row in 0..table.row_count().saturating_sub(1) {
        let cells: Vec<String> = shown
            .iter()
            .map(|column| {
                table
                    .value_at(row, *column)
                    .map(|cell| cell.display())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
    Ok(())
}
