//! Rows of the persisted schema graph and the eagerly loaded tree built from them.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::ast::{ConstraintKind, ForeignKeyTarget, ParsedConstraint, ParsedField, ParsedTable};

/// Root of one imported schema.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaVersion {
    pub id: i64,
    pub version_name: String,
    pub description: Option<String>,
    pub created_at: String,
    #[sqlx(skip)]
    pub tables: Vec<SchemaTable>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaVersionSummary {
    pub id: i64,
    pub version_name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaTable {
    pub id: i64,
    pub schema_version_id: i64,
    pub table_name: String,
    #[sqlx(skip)]
    pub fields: Vec<SchemaField>,
    #[sqlx(skip)]
    pub constraints: Vec<SchemaConstraint>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaField {
    pub id: i64,
    pub table_id: i64,
    pub field_name: String,
    pub field_type: String,
    pub is_unsigned: bool,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub is_auto_increment: bool,
    /// 1-based declaration order.
    pub field_order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaConstraint {
    pub id: i64,
    pub table_id: i64,
    pub constraint_name: Option<String>,
    pub constraint_type: ConstraintKind,
    pub columns: Vec<SchemaConstraintColumn>,
    pub reference: Option<SchemaForeignKeyReference>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SchemaConstraint {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("constraint_type")?;
        let constraint_type = kind
            .parse::<ConstraintKind>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "constraint_type".to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            id: row.try_get("id")?,
            table_id: row.try_get("table_id")?,
            constraint_name: row.try_get("constraint_name")?,
            constraint_type,
            columns: Vec::new(),
            reference: None,
        })
    }
}

/// A constraint member. `field_name` is joined in from the referenced field.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaConstraintColumn {
    pub id: i64,
    pub constraint_id: i64,
    pub field_id: i64,
    pub column_order: i64,
    pub field_name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaForeignKeyReference {
    pub id: i64,
    pub constraint_id: i64,
    pub referenced_table_id: i64,
    pub referenced_table_name: String,
    #[sqlx(skip)]
    pub columns: Vec<SchemaForeignKeyReferenceColumn>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SchemaForeignKeyReferenceColumn {
    pub id: i64,
    pub reference_id: i64,
    pub referenced_field_id: i64,
    pub column_order: i64,
    pub field_name: String,
}

impl SchemaVersion {
    pub fn table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    /// Convert the stored tree back into the parser's model.
    pub fn to_parsed_tables(&self) -> Vec<ParsedTable> {
        self.tables.iter().map(SchemaTable::to_parsed).collect()
    }
}

impl SchemaTable {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    pub fn to_parsed(&self) -> ParsedTable {
        ParsedTable {
            name: self.table_name.clone(),
            fields: self.fields.iter().map(SchemaField::to_parsed).collect(),
            constraints: self.constraints.iter().map(SchemaConstraint::to_parsed).collect(),
        }
    }
}

impl SchemaField {
    pub fn to_parsed(&self) -> ParsedField {
        ParsedField {
            name: self.field_name.clone(),
            typ: self.field_type.clone(),
            unsigned: self.is_unsigned,
            nullable: self.is_nullable,
            default: self.default_value.clone(),
            auto_increment: self.is_auto_increment,
        }
    }
}

impl SchemaConstraint {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field_name.clone()).collect()
    }

    pub fn to_parsed(&self) -> ParsedConstraint {
        let name = self.constraint_name.clone();
        let columns = self.column_names();
        match self.constraint_type {
            ConstraintKind::PrimaryKey => ParsedConstraint::PrimaryKey { columns },
            ConstraintKind::Unique => ParsedConstraint::Unique { name, columns },
            ConstraintKind::Key | ConstraintKind::Index => ParsedConstraint::Key { name, columns },
            ConstraintKind::ForeignKey => {
                let references = match &self.reference {
                    Some(r) => ForeignKeyTarget {
                        table: r.referenced_table_name.clone(),
                        columns: r.columns.iter().map(|c| c.field_name.clone()).collect(),
                    },
                    None => ForeignKeyTarget {
                        table: String::new(),
                        columns: Vec::new(),
                    },
                };
                ParsedConstraint::ForeignKey {
                    name: name.unwrap_or_default(),
                    columns,
                    references,
                }
            }
        }
    }
}
