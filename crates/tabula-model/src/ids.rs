// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(ObjectClassId);
entity_id!(ObjectId);
entity_id!(RelationshipClassId);
entity_id!(RelationshipId);
entity_id!(ParameterDefinitionId);
entity_id!(ParameterValueId);
entity_id!(ParameterTagId);
entity_id!(ValueListId);
