// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

mod cell;
mod events;
mod ids;
mod kind;
mod records;

pub use cell::*;
pub use events::*;
pub use ids::*;
pub use kind::*;
pub use records::*;
