use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    #[serde(rename = "table_name")]
    pub name: String,
    pub fields: Vec<ParsedField>,
    pub constraints: Vec<ParsedConstraint>,
}

impl ParsedTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&ParsedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedField {
    pub name: String,
    /// Type name with its size arguments, e.g. `VARCHAR(255)` or `DECIMAL(10,2)`.
    #[serde(rename = "type")]
    pub typ: String,
    pub unsigned: bool,
    pub nullable: bool,
    /// `Some("NULL")` for an explicit `DEFAULT NULL`, `None` when no DEFAULT was given.
    pub default: Option<String>,
    pub auto_increment: bool,
}

impl ParsedField {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            unsigned: false,
            nullable: true,
            default: None,
            auto_increment: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParsedConstraint {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey { columns: Vec<String> },
    #[serde(rename = "KEY")]
    Key {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        columns: Vec<String>,
    },
    #[serde(rename = "UNIQUE")]
    Unique {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        columns: Vec<String>,
    },
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey {
        name: String,
        columns: Vec<String>,
        references: ForeignKeyTarget,
    },
}

impl ParsedConstraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::PrimaryKey { .. } => ConstraintKind::PrimaryKey,
            Self::Key { .. } => ConstraintKind::Key,
            Self::Unique { .. } => ConstraintKind::Unique,
            Self::ForeignKey { .. } => ConstraintKind::ForeignKey,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::PrimaryKey { .. } => None,
            Self::Key { name, .. } | Self::Unique { name, .. } => name.as_deref(),
            Self::ForeignKey { name, .. } => Some(name),
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey { columns }
            | Self::Key { columns, .. }
            | Self::Unique { columns, .. }
            | Self::ForeignKey { columns, .. } => columns,
        }
    }

    pub fn references(&self) -> Option<&ForeignKeyTarget> {
        match self {
            Self::ForeignKey { references, .. } => Some(references),
            _ => None,
        }
    }
}

/// Constraint type as persisted in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "KEY")]
    Key,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "INDEX")]
    Index,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::Key => "KEY",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Index => "INDEX",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown constraint type: {0}")]
pub struct UnknownConstraintKind(pub String);

impl FromStr for ConstraintKind {
    type Err = UnknownConstraintKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIMARY KEY" => Ok(Self::PrimaryKey),
            "UNIQUE" => Ok(Self::Unique),
            "KEY" => Ok(Self::Key),
            "FOREIGN KEY" => Ok(Self::ForeignKey),
            "INDEX" => Ok(Self::Index),
            other => Err(UnknownConstraintKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_serialization_shape() {
        let mut field = ParsedField::new("name", "VARCHAR(255)");
        field.nullable = false;

        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "name",
                "type": "VARCHAR(255)",
                "unsigned": false,
                "nullable": false,
                "default": null,
                "auto_increment": false,
            })
        );
    }

    #[test]
    fn test_constraint_serialization_shape() {
        let fk = ParsedConstraint::ForeignKey {
            name: "fk_user".to_string(),
            columns: vec!["user_id".to_string()],
            references: ForeignKeyTarget {
                table: "users".to_string(),
                columns: vec!["id".to_string()],
            },
        };
        assert_eq!(
            serde_json::to_value(&fk).unwrap(),
            json!({
                "type": "FOREIGN KEY",
                "name": "fk_user",
                "columns": ["user_id"],
                "references": {"table": "users", "columns": ["id"]},
            })
        );

        let pk = ParsedConstraint::PrimaryKey {
            columns: vec!["id".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&pk).unwrap(),
            json!({"type": "PRIMARY KEY", "columns": ["id"]})
        );

        let key = ParsedConstraint::Key {
            name: None,
            columns: vec!["a".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&key).unwrap(),
            json!({"type": "KEY", "columns": ["a"]})
        );
    }

    #[test]
    fn test_constraint_kind_round_trips_through_str() {
        for kind in [
            ConstraintKind::PrimaryKey,
            ConstraintKind::Unique,
            ConstraintKind::Key,
            ConstraintKind::ForeignKey,
            ConstraintKind::Index,
        ] {
            assert_eq!(kind.as_str().parse::<ConstraintKind>().unwrap(), kind);
        }
        assert!("CHECK".parse::<ConstraintKind>().is_err());
    }
}
