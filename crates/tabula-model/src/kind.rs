// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

/// The four logical table kinds the engine federates. Each kind has one
/// composite table built from per-class backing tables plus a staging
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    ObjectParameterValue,
    ObjectParameterDefinition,
    RelationshipParameterValue,
    RelationshipParameterDefinition,
}

impl TableKind {
    pub const ALL: [Self; 4] = [
        Self::ObjectParameterValue,
        Self::ObjectParameterDefinition,
        Self::RelationshipParameterValue,
        Self::RelationshipParameterDefinition,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectParameterValue => "object_parameter_value",
            Self::ObjectParameterDefinition => "object_parameter_definition",
            Self::RelationshipParameterValue => "relationship_parameter_value",
            Self::RelationshipParameterDefinition => "relationship_parameter_definition",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "object_parameter_value" => Some(Self::ObjectParameterValue),
            "object_parameter_definition" => Some(Self::ObjectParameterDefinition),
            "relationship_parameter_value" => Some(Self::RelationshipParameterValue),
            "relationship_parameter_definition" => Some(Self::RelationshipParameterDefinition),
            _ => None,
        }
    }

    pub const fn is_value(self) -> bool {
        matches!(
            self,
            Self::ObjectParameterValue | Self::RelationshipParameterValue
        )
    }

    pub const fn is_relationship(self) -> bool {
        matches!(
            self,
            Self::RelationshipParameterValue | Self::RelationshipParameterDefinition
        )
    }

    pub const fn header(self) -> Header {
        match self {
            Self::ObjectParameterValue => Header {
                columns: OBJECT_VALUE_COLUMNS,
            },
            Self::ObjectParameterDefinition => Header {
                columns: OBJECT_DEFINITION_COLUMNS,
            },
            Self::RelationshipParameterValue => Header {
                columns: RELATIONSHIP_VALUE_COLUMNS,
            },
            Self::RelationshipParameterDefinition => Header {
                columns: RELATIONSHIP_DEFINITION_COLUMNS,
            },
        }
    }

    /// Column routing rows to their class sub-table.
    pub const fn class_id_column(self) -> usize {
        0
    }

    /// Column holding the class display name.
    pub const fn class_name_column(self) -> usize {
        1
    }

    /// The identity column, filled in once the external store has
    /// accepted the row. Always last.
    pub const fn id_column(self) -> usize {
        self.header().columns.len() - 1
    }
}

/// One column of a kind-wide header. Fixed columns are denormalized
/// display values only the cascade handler may rewrite; hidden columns
/// carry foreign keys and are not shown by table views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub fixed: bool,
    pub hidden: bool,
}

const fn fixed(name: &'static str) -> Column {
    Column {
        name,
        fixed: true,
        hidden: false,
    }
}

const fn hidden(name: &'static str) -> Column {
    Column {
        name,
        fixed: false,
        hidden: true,
    }
}

const fn editable(name: &'static str) -> Column {
    Column {
        name,
        fixed: false,
        hidden: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub columns: &'static [Column],
}

impl Header {
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn is_fixed(&self, column: usize) -> bool {
        self.columns.get(column).is_some_and(|c| c.fixed)
    }

    pub fn name_of(&self, column: usize) -> Option<&'static str> {
        self.columns.get(column).map(|c| c.name)
    }
}

/// Column indexes for [`TableKind::ObjectParameterValue`].
pub mod object_value {
    pub const OBJECT_CLASS_ID: usize = 0;
    pub const OBJECT_CLASS_NAME: usize = 1;
    pub const OBJECT_ID: usize = 2;
    pub const OBJECT_NAME: usize = 3;
    pub const PARAMETER_ID: usize = 4;
    pub const PARAMETER_NAME: usize = 5;
    pub const VALUE: usize = 6;
    pub const ID: usize = 7;
}

const OBJECT_VALUE_COLUMNS: &[Column] = &[
    hidden("object_class_id"),
    fixed("object_class_name"),
    hidden("object_id"),
    fixed("object_name"),
    hidden("parameter_id"),
    fixed("parameter_name"),
    editable("value"),
    hidden("id"),
];

/// Column indexes for [`TableKind::RelationshipParameterValue`].
pub mod relationship_value {
    pub const RELATIONSHIP_CLASS_ID: usize = 0;
    pub const RELATIONSHIP_CLASS_NAME: usize = 1;
    pub const OBJECT_CLASS_ID_LIST: usize = 2;
    pub const OBJECT_CLASS_NAME_LIST: usize = 3;
    pub const RELATIONSHIP_ID: usize = 4;
    pub const OBJECT_ID_LIST: usize = 5;
    pub const OBJECT_NAME_LIST: usize = 6;
    pub const PARAMETER_ID: usize = 7;
    pub const PARAMETER_NAME: usize = 8;
    pub const VALUE: usize = 9;
    pub const ID: usize = 10;
}

const RELATIONSHIP_VALUE_COLUMNS: &[Column] = &[
    hidden("relationship_class_id"),
    fixed("relationship_class_name"),
    hidden("object_class_id_list"),
    fixed("object_class_name_list"),
    hidden("relationship_id"),
    hidden("object_id_list"),
    fixed("object_name_list"),
    hidden("parameter_id"),
    fixed("parameter_name"),
    editable("value"),
    hidden("id"),
];

/// Column indexes for [`TableKind::ObjectParameterDefinition`].
pub mod object_definition {
    pub const OBJECT_CLASS_ID: usize = 0;
    pub const OBJECT_CLASS_NAME: usize = 1;
    pub const PARAMETER_NAME: usize = 2;
    pub const VALUE_LIST_ID: usize = 3;
    pub const VALUE_LIST_NAME: usize = 4;
    pub const PARAMETER_TAG_ID_LIST: usize = 5;
    pub const PARAMETER_TAG_LIST: usize = 6;
    pub const DEFAULT_VALUE: usize = 7;
    pub const ID: usize = 8;
}

const OBJECT_DEFINITION_COLUMNS: &[Column] = &[
    hidden("object_class_id"),
    fixed("object_class_name"),
    editable("parameter_name"),
    hidden("value_list_id"),
    editable("value_list_name"),
    hidden("parameter_tag_id_list"),
    editable("parameter_tag_list"),
    editable("default_value"),
    hidden("id"),
];

/// Column indexes for [`TableKind::RelationshipParameterDefinition`].
pub mod relationship_definition {
    pub const RELATIONSHIP_CLASS_ID: usize = 0;
    pub const RELATIONSHIP_CLASS_NAME: usize = 1;
    pub const OBJECT_CLASS_ID_LIST: usize = 2;
    pub const OBJECT_CLASS_NAME_LIST: usize = 3;
    pub const PARAMETER_NAME: usize = 4;
    pub const VALUE_LIST_ID: usize = 5;
    pub const VALUE_LIST_NAME: usize = 6;
    pub const PARAMETER_TAG_ID_LIST: usize = 7;
    pub const PARAMETER_TAG_LIST: usize = 8;
    pub const DEFAULT_VALUE: usize = 9;
    pub const ID: usize = 10;
}

const RELATIONSHIP_DEFINITION_COLUMNS: &[Column] = &[
    hidden("relationship_class_id"),
    fixed("relationship_class_name"),
    hidden("object_class_id_list"),
    fixed("object_class_name_list"),
    editable("parameter_name"),
    hidden("value_list_id"),
    editable("value_list_name"),
    hidden("parameter_tag_id_list"),
    editable("parameter_tag_list"),
    editable("default_value"),
    hidden("id"),
];

#[cfg(test)]
mod tests {
    use super::{TableKind, object_value, relationship_value};

    #[test]
    fn kind_round_trip() {
        for kind in TableKind::ALL {
            assert_eq!(TableKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TableKind::parse("pivot"), None);
    }

    #[test]
    fn identity_column_is_last() {
        for kind in TableKind::ALL {
            let header = kind.header();
            assert_eq!(header.name_of(kind.id_column()), Some("id"));
            assert_eq!(kind.id_column(), header.len() - 1);
        }
        assert_eq!(
            TableKind::ObjectParameterValue.id_column(),
            object_value::ID
        );
        assert_eq!(
            TableKind::RelationshipParameterValue.id_column(),
            relationship_value::ID
        );
    }

    #[test]
    fn class_columns_lead_every_header() {
        for kind in TableKind::ALL {
            let header = kind.header();
            let class_id_name = header
                .name_of(kind.class_id_column())
                .expect("class id column");
            assert!(class_id_name.ends_with("_class_id"), "{class_id_name}");
            assert!(header.is_fixed(kind.class_name_column()));
        }
    }

    #[test]
    fn fixed_columns_match_denormalized_names() {
        let header = TableKind::ObjectParameterValue.header();
        let fixed = header
            .columns
            .iter()
            .filter(|c| c.fixed)
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(fixed, ["object_class_name", "object_name", "parameter_name"]);
    }
}
