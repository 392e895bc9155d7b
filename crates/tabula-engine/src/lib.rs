// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

mod backend;
mod commit;
mod composite;
mod filter;
mod staging;
mod table;

pub use backend::*;
pub use commit::EditReport;
pub use composite::*;
pub use filter::RowFilter;
pub use staging::StagingTable;
pub use table::{BackingTable, CellEdit, Envelope};
