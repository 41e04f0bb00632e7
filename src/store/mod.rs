//! Versioned persistence of parsed schemas in SQLite.
//!
//! An import writes every table and field first, then every constraint and
//! foreign-key reference, inside a single transaction. Foreign keys are thus
//! resolved against the complete set of tables of the import, and a failure
//! at any step leaves nothing behind.

mod model;

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ast::ParsedTable;
use crate::sql::{parse_sql, SqlParseError};

pub use model::{
    SchemaConstraint, SchemaConstraintColumn, SchemaField, SchemaForeignKeyReference,
    SchemaForeignKeyReferenceColumn, SchemaTable, SchemaVersion, SchemaVersionSummary,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Parse(#[from] SqlParseError),
    #[error(
        "Foreign key {constraint} on table {table} references unknown table {referenced_table}"
    )]
    UnresolvedReference {
        table: String,
        constraint: String,
        referenced_table: String,
    },
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS schema_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        version_name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_tables (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        schema_version_id INTEGER NOT NULL REFERENCES schema_versions(id) ON DELETE CASCADE,
        table_name TEXT NOT NULL,
        UNIQUE(schema_version_id, table_name)
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_id INTEGER NOT NULL REFERENCES schema_tables(id) ON DELETE CASCADE,
        field_name TEXT NOT NULL,
        field_type TEXT NOT NULL,
        is_unsigned BOOLEAN NOT NULL,
        is_nullable BOOLEAN NOT NULL,
        default_value TEXT,
        is_auto_increment BOOLEAN NOT NULL,
        field_order INTEGER NOT NULL,
        UNIQUE(table_id, field_name)
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_constraints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_id INTEGER NOT NULL REFERENCES schema_tables(id) ON DELETE CASCADE,
        constraint_name TEXT,
        constraint_type TEXT NOT NULL
            CHECK (constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'KEY', 'FOREIGN KEY', 'INDEX'))
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_constraint_columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        constraint_id INTEGER NOT NULL REFERENCES schema_constraints(id) ON DELETE CASCADE,
        field_id INTEGER NOT NULL REFERENCES schema_fields(id) ON DELETE CASCADE,
        column_order INTEGER NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_fk_references (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        constraint_id INTEGER NOT NULL UNIQUE REFERENCES schema_constraints(id) ON DELETE CASCADE,
        referenced_table_id INTEGER NOT NULL REFERENCES schema_tables(id) ON DELETE CASCADE
    );"#,
    r#"CREATE TABLE IF NOT EXISTS schema_fk_reference_columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reference_id INTEGER NOT NULL REFERENCES schema_fk_references(id) ON DELETE CASCADE,
        referenced_field_id INTEGER NOT NULL REFERENCES schema_fields(id) ON DELETE CASCADE,
        column_order INTEGER NOT NULL
    );"#,
];

/// Ids written during phase 1, keyed by table name.
struct StoredTable {
    id: i64,
    fields: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct SchemaStore {
    pool: SqlitePool,
}

impl SchemaStore {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the schema graph tables exist.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database gets its own copy
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Private in-memory store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn init(&self) -> Result<(), StoreError> {
        for q in SCHEMA {
            sqlx::query(q).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Parse `sql` and store the result as a new schema version.
    pub async fn parse_and_store(
        &self,
        sql: &str,
        version_name: &str,
        description: Option<&str>,
    ) -> Result<SchemaVersion, StoreError> {
        let tables = parse_sql(sql)?;
        self.store_schema(&tables, version_name, description).await
    }

    /// Store `tables` as one new schema version, atomically.
    pub async fn store_schema(
        &self,
        tables: &[ParsedTable],
        version_name: &str,
        description: Option<&str>,
    ) -> Result<SchemaVersion, StoreError> {
        let mut tx = self.pool.begin().await?;

        let version_id = match write_schema(&mut tx, tables, version_name, description).await {
            Ok(id) => id,
            Err(e) => {
                warn!(version = version_name, error = %e, "rolling back schema import");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(version = version_name, error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            version = version_name,
            id = version_id,
            tables = tables.len(),
            "stored schema version"
        );

        self.get_schema_version(version_id)
            .await?
            .ok_or(StoreError::Persistence(sqlx::Error::RowNotFound))
    }

    /// Load a schema version with its whole tree, or `None` if absent.
    pub async fn get_schema_version(&self, id: i64) -> Result<Option<SchemaVersion>, StoreError> {
        let version = sqlx::query_as::<_, SchemaVersion>(
            r#"SELECT id, version_name, description, created_at
               FROM schema_versions WHERE id = ?1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(version) => Ok(Some(self.load_tree(version).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_schema_version_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SchemaVersion>, StoreError> {
        let version = sqlx::query_as::<_, SchemaVersion>(
            r#"SELECT id, version_name, description, created_at
               FROM schema_versions WHERE version_name = ?1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(version) => Ok(Some(self.load_tree(version).await?)),
            None => Ok(None),
        }
    }

    /// All schema versions, newest first, without their trees.
    pub async fn list_schema_versions(&self) -> Result<Vec<SchemaVersionSummary>, StoreError> {
        let rows = sqlx::query_as::<_, SchemaVersionSummary>(
            r#"SELECT id, version_name, description, created_at
               FROM schema_versions ORDER BY id DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete a schema version and, by cascade, everything it owns.
    pub async fn delete_schema_version(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM schema_versions WHERE id = ?1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(id, "deleted schema version");
        }
        Ok(deleted)
    }

    async fn load_tree(&self, mut version: SchemaVersion) -> Result<SchemaVersion, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let tables = sqlx::query_as::<_, SchemaTable>(
            r#"SELECT id, schema_version_id, table_name
               FROM schema_tables WHERE schema_version_id = ?1 ORDER BY id"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        let fields = sqlx::query_as::<_, SchemaField>(
            r#"SELECT f.id, f.table_id, f.field_name, f.field_type, f.is_unsigned,
                      f.is_nullable, f.default_value, f.is_auto_increment, f.field_order
               FROM schema_fields f
               JOIN schema_tables t ON f.table_id = t.id
               WHERE t.schema_version_id = ?1
               ORDER BY f.table_id, f.field_order"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        let constraints = sqlx::query_as::<_, SchemaConstraint>(
            r#"SELECT c.id, c.table_id, c.constraint_name, c.constraint_type
               FROM schema_constraints c
               JOIN schema_tables t ON c.table_id = t.id
               WHERE t.schema_version_id = ?1
               ORDER BY c.id"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        let constraint_columns = sqlx::query_as::<_, SchemaConstraintColumn>(
            r#"SELECT cc.id, cc.constraint_id, cc.field_id, cc.column_order, f.field_name
               FROM schema_constraint_columns cc
               JOIN schema_constraints c ON cc.constraint_id = c.id
               JOIN schema_tables t ON c.table_id = t.id
               JOIN schema_fields f ON cc.field_id = f.id
               WHERE t.schema_version_id = ?1
               ORDER BY cc.constraint_id, cc.column_order"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        let references = sqlx::query_as::<_, SchemaForeignKeyReference>(
            r#"SELECT r.id, r.constraint_id, r.referenced_table_id,
                      rt.table_name AS referenced_table_name
               FROM schema_fk_references r
               JOIN schema_constraints c ON r.constraint_id = c.id
               JOIN schema_tables t ON c.table_id = t.id
               JOIN schema_tables rt ON r.referenced_table_id = rt.id
               WHERE t.schema_version_id = ?1"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        let reference_columns = sqlx::query_as::<_, SchemaForeignKeyReferenceColumn>(
            r#"SELECT rc.id, rc.reference_id, rc.referenced_field_id, rc.column_order, f.field_name
               FROM schema_fk_reference_columns rc
               JOIN schema_fk_references r ON rc.reference_id = r.id
               JOIN schema_constraints c ON r.constraint_id = c.id
               JOIN schema_tables t ON c.table_id = t.id
               JOIN schema_fields f ON rc.referenced_field_id = f.id
               WHERE t.schema_version_id = ?1
               ORDER BY rc.reference_id, rc.column_order"#,
        )
        .bind(version.id)
        .fetch_all(&mut *conn)
        .await?;

        // Assemble bottom-up; every query above is already in display order
        let mut ref_columns_by_ref: HashMap<i64, Vec<SchemaForeignKeyReferenceColumn>> =
            HashMap::new();
        for col in reference_columns {
            ref_columns_by_ref.entry(col.reference_id).or_default().push(col);
        }

        let mut reference_by_constraint: HashMap<i64, SchemaForeignKeyReference> = HashMap::new();
        for mut reference in references {
            reference.columns = ref_columns_by_ref.remove(&reference.id).unwrap_or_default();
            reference_by_constraint.insert(reference.constraint_id, reference);
        }

        let mut columns_by_constraint: HashMap<i64, Vec<SchemaConstraintColumn>> = HashMap::new();
        for col in constraint_columns {
            columns_by_constraint.entry(col.constraint_id).or_default().push(col);
        }

        let mut constraints_by_table: HashMap<i64, Vec<SchemaConstraint>> = HashMap::new();
        for mut constraint in constraints {
            constraint.columns = columns_by_constraint
                .remove(&constraint.id)
                .unwrap_or_default();
            constraint.reference = reference_by_constraint.remove(&constraint.id);
            constraints_by_table
                .entry(constraint.table_id)
                .or_default()
                .push(constraint);
        }

        let mut fields_by_table: HashMap<i64, Vec<SchemaField>> = HashMap::new();
        for field in fields {
            fields_by_table.entry(field.table_id).or_default().push(field);
        }

        version.tables = tables
            .into_iter()
            .map(|mut table| {
                table.fields = fields_by_table.remove(&table.id).unwrap_or_default();
                table.constraints = constraints_by_table.remove(&table.id).unwrap_or_default();
                table
            })
            .collect();

        Ok(version)
    }
}

/// Both write phases. Returns the new schema version id; the caller owns the
/// transaction and decides between commit and rollback.
async fn write_schema(
    conn: &mut SqliteConnection,
    tables: &[ParsedTable],
    version_name: &str,
    description: Option<&str>,
) -> Result<i64, StoreError> {
    let created_at = chrono::Utc::now().to_rfc3339();
    let version_id = sqlx::query(
        r#"INSERT INTO schema_versions (version_name, description, created_at)
           VALUES (?1, ?2, ?3)"#,
    )
    .bind(version_name)
    .bind(description)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    // Phase 1: tables and fields
    let mut stored: HashMap<&str, StoredTable> = HashMap::new();
    for table in tables {
        let table_id = sqlx::query(
            r#"INSERT INTO schema_tables (schema_version_id, table_name) VALUES (?1, ?2)"#,
        )
        .bind(version_id)
        .bind(&table.name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        let mut fields = HashMap::new();
        for (order, field) in (1i64..).zip(&table.fields) {
            let field_id = sqlx::query(
                r#"INSERT INTO schema_fields (table_id, field_name, field_type, is_unsigned,
                       is_nullable, default_value, is_auto_increment, field_order)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )
            .bind(table_id)
            .bind(&field.name)
            .bind(&field.typ)
            .bind(field.unsigned)
            .bind(field.nullable)
            .bind(field.default.as_deref())
            .bind(field.auto_increment)
            .bind(order)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            fields.insert(field.name.clone(), field_id);
        }

        stored.insert(
            table.name.as_str(),
            StoredTable {
                id: table_id,
                fields,
            },
        );
    }

    // Phase 2: constraints and foreign-key references
    for table in tables {
        let Some(owner) = stored.get(table.name.as_str()) else {
            continue;
        };

        for constraint in &table.constraints {
            let constraint_id = sqlx::query(
                r#"INSERT INTO schema_constraints (table_id, constraint_name, constraint_type)
                   VALUES (?1, ?2, ?3)"#,
            )
            .bind(owner.id)
            .bind(constraint.name())
            .bind(constraint.kind().as_str())
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

            let mut order = 0i64;
            for column in constraint.columns() {
                let Some(&field_id) = owner.fields.get(column) else {
                    debug!(table = %table.name, column = %column, "skipping unknown constraint column");
                    continue;
                };
                order += 1;
                sqlx::query(
                    r#"INSERT INTO schema_constraint_columns (constraint_id, field_id, column_order)
                       VALUES (?1, ?2, ?3)"#,
                )
                .bind(constraint_id)
                .bind(field_id)
                .bind(order)
                .execute(&mut *conn)
                .await?;
            }

            let Some(target) = constraint.references() else {
                continue;
            };
            let Some(referenced) = stored.get(target.table.as_str()) else {
                return Err(StoreError::UnresolvedReference {
                    table: table.name.clone(),
                    constraint: constraint.name().unwrap_or_default().to_string(),
                    referenced_table: target.table.clone(),
                });
            };

            let reference_id = sqlx::query(
                r#"INSERT INTO schema_fk_references (constraint_id, referenced_table_id)
                   VALUES (?1, ?2)"#,
            )
            .bind(constraint_id)
            .bind(referenced.id)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

            let mut order = 0i64;
            for column in &target.columns {
                let Some(&field_id) = referenced.fields.get(column) else {
                    debug!(table = %target.table, column = %column, "skipping unknown referenced column");
                    continue;
                };
                order += 1;
                sqlx::query(
                    r#"INSERT INTO schema_fk_reference_columns (reference_id, referenced_field_id, column_order)
                       VALUES (?1, ?2, ?3)"#,
                )
                .bind(reference_id)
                .bind(field_id)
                .bind(order)
                .execute(&mut *conn)
                .await?;
            }
        }
    }

    Ok(version_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ConstraintKind;
    use crate::sql::parse_sql;

    const SHOP: &str = "
        CREATE TABLE `users` (
            `id` INT UNSIGNED AUTO_INCREMENT,
            `email` VARCHAR(255) NOT NULL,
            `status` VARCHAR(16) DEFAULT 'active',
            PRIMARY KEY (`id`),
            UNIQUE KEY `uk_email` (`email`)
        ) ENGINE=InnoDB;
        CREATE TABLE `orders` (
            `id` INT UNSIGNED AUTO_INCREMENT,
            `user_id` INT UNSIGNED NOT NULL,
            `shop_id` INT,
            `total` DECIMAL(10,2) DEFAULT NULL,
            PRIMARY KEY (`shop_id`, `id`),
            KEY `idx_user` (`user_id`)
        );
        ALTER TABLE `orders` ADD CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users`(`id`);
    ";

    async fn count(store: &SchemaStore, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_load_full_tree() {
        let store = SchemaStore::in_memory().await.unwrap();
        let version = store
            .parse_and_store(SHOP, "v1", Some("initial import"))
            .await
            .unwrap();

        assert_eq!(version.version_name, "v1");
        assert_eq!(version.description.as_deref(), Some("initial import"));
        assert_eq!(version.tables.len(), 2);

        let users = version.table("users").unwrap();
        let orders = version.table("orders").unwrap();
        let orders_ids: Vec<i64> = orders.fields.iter().map(|f| f.field_order).collect();
        assert_eq!(orders_ids, vec![1, 2, 3, 4]);

        let email = users.field("email").unwrap();
        assert!(!email.is_nullable);
        assert_eq!(users.field("status").unwrap().default_value.as_deref(), Some("active"));
        assert_eq!(orders.field("total").unwrap().default_value.as_deref(), Some("NULL"));
        assert!(users.field("id").unwrap().is_unsigned);
        assert!(users.field("id").unwrap().is_auto_increment);

        let pk = &orders.constraints[0];
        assert_eq!(pk.constraint_type, ConstraintKind::PrimaryKey);
        assert_eq!(pk.column_names(), vec!["shop_id", "id"]);

        let fk = orders
            .constraints
            .iter()
            .find(|c| c.constraint_type == ConstraintKind::ForeignKey)
            .unwrap();
        assert_eq!(fk.constraint_name.as_deref(), Some("fk_user"));
        let reference = fk.reference.as_ref().unwrap();
        assert_eq!(reference.referenced_table_id, users.id);
        assert_eq!(reference.referenced_table_name, "users");
        assert_eq!(reference.columns.len(), 1);
        assert_eq!(reference.columns[0].referenced_field_id, users.field("id").unwrap().id);
    }

    #[tokio::test]
    async fn test_loaded_tree_matches_parsed_tables() {
        let store = SchemaStore::in_memory().await.unwrap();
        let tables = parse_sql(SHOP).unwrap();
        let version = store.store_schema(&tables, "v1", None).await.unwrap();

        assert_eq!(version.to_parsed_tables(), tables);

        let by_name = store.get_schema_version_by_name("v1").await.unwrap().unwrap();
        assert_eq!(by_name.id, version.id);
        assert_eq!(by_name.to_parsed_tables(), tables);
    }

    #[tokio::test]
    async fn test_unresolved_reference_rolls_back_everything() {
        let store = SchemaStore::in_memory().await.unwrap();
        let sql = "
            CREATE TABLE `orders` (
                `user_id` INT,
                CONSTRAINT `fk_ghost` FOREIGN KEY (`user_id`) REFERENCES `ghosts` (`id`)
            );";

        let err = store.parse_and_store(sql, "broken", None).await.unwrap_err();
        match err {
            StoreError::UnresolvedReference {
                table,
                constraint,
                referenced_table,
            } => {
                assert_eq!(table, "orders");
                assert_eq!(constraint, "fk_ghost");
                assert_eq!(referenced_table, "ghosts");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        for table in [
            "schema_versions",
            "schema_tables",
            "schema_fields",
            "schema_constraints",
            "schema_constraint_columns",
        ] {
            assert_eq!(count(&store, table).await, 0, "{table} should be empty");
        }
        assert!(store.get_schema_version_by_name("broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_key_to_later_table_resolves() {
        let store = SchemaStore::in_memory().await.unwrap();
        let sql = "
            CREATE TABLE `orders` (
                `user_id` INT,
                CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
            );
            CREATE TABLE `users` (`id` INT);";

        let version = store.parse_and_store(sql, "v1", None).await.unwrap();
        let users = version.table("users").unwrap();
        let fk = &version.table("orders").unwrap().constraints[0];
        assert_eq!(fk.reference.as_ref().unwrap().referenced_table_id, users.id);
    }

    #[tokio::test]
    async fn test_composite_foreign_key_keeps_column_order() {
        let store = SchemaStore::in_memory().await.unwrap();
        let sql = "
            CREATE TABLE `p` (`x` INT, `y` INT);
            CREATE TABLE `t` (
                `a` INT,
                `b` INT,
                CONSTRAINT `fk` FOREIGN KEY (`a`, `b`) REFERENCES `p` (`y`, `x`)
            );";

        let version = store.parse_and_store(sql, "v1", None).await.unwrap();
        let fk = &version.table("t").unwrap().constraints[0];
        assert_eq!(fk.constraint_type, ConstraintKind::ForeignKey);
        assert_eq!(fk.column_names(), vec!["a", "b"]);
        let orders: Vec<i64> = fk.columns.iter().map(|c| c.column_order).collect();
        assert_eq!(orders, vec![1, 2]);

        let reference = fk.reference.as_ref().unwrap();
        assert_eq!(reference.referenced_table_name, "p");
        let targets: Vec<(&str, i64)> = reference
            .columns
            .iter()
            .map(|c| (c.field_name.as_str(), c.column_order))
            .collect();
        assert_eq!(targets, vec![("y", 1), ("x", 2)]);
    }

    #[tokio::test]
    async fn test_unknown_constraint_columns_are_skipped() {
        let store = SchemaStore::in_memory().await.unwrap();
        let sql = "
            CREATE TABLE `users` (`id` INT);
            CREATE TABLE `t` (
                `a` INT,
                `b` INT,
                KEY `k` (`a`, `missing`, `b`),
                CONSTRAINT `fk` FOREIGN KEY (`a`) REFERENCES `users` (`nope`, `id`)
            );";

        let version = store.parse_and_store(sql, "v1", None).await.unwrap();
        let t = version.table("t").unwrap();

        let key = &t.constraints[0];
        assert_eq!(key.column_names(), vec!["a", "b"]);
        let orders: Vec<i64> = key.columns.iter().map(|c| c.column_order).collect();
        assert_eq!(orders, vec![1, 2]);

        let reference = t.constraints[1].reference.as_ref().unwrap();
        assert_eq!(reference.columns.len(), 1);
        assert_eq!(reference.columns[0].field_name, "id");
    }

    #[tokio::test]
    async fn test_duplicate_version_name_is_rejected() {
        let store = SchemaStore::in_memory().await.unwrap();
        store.parse_and_store(SHOP, "v1", None).await.unwrap();

        let err = store.parse_and_store(SHOP, "v1", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));

        assert_eq!(store.list_schema_versions().await.unwrap().len(), 1);
        assert_eq!(count(&store, "schema_tables").await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_field_rolls_back() {
        let store = SchemaStore::in_memory().await.unwrap();
        let err = store
            .parse_and_store("CREATE TABLE `t` (`a` INT, `a` TEXT);", "dup", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert_eq!(count(&store, "schema_versions").await, 0);
    }

    #[tokio::test]
    async fn test_parse_error_stores_nothing() {
        let store = SchemaStore::in_memory().await.unwrap();
        let err = store
            .parse_and_store("CREATE TABLE (", "bad", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));
        assert_eq!(count(&store, "schema_versions").await, 0);
    }

    #[tokio::test]
    async fn test_list_and_delete_versions() {
        let store = SchemaStore::in_memory().await.unwrap();
        let v1 = store.parse_and_store(SHOP, "v1", None).await.unwrap();
        let v2 = store
            .parse_and_store("CREATE TABLE `x` (`id` INT);", "v2", Some("second"))
            .await
            .unwrap();

        let listed = store.list_schema_versions().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|v| v.version_name.as_str()).collect();
        assert_eq!(names, vec!["v2", "v1"]);
        assert_eq!(listed[0].description.as_deref(), Some("second"));

        assert!(store.delete_schema_version(v1.id).await.unwrap());
        assert!(!store.delete_schema_version(v1.id).await.unwrap());
        assert!(store.get_schema_version(v1.id).await.unwrap().is_none());

        // Only v2's single table and field survive the cascade
        assert_eq!(count(&store, "schema_tables").await, 1);
        assert_eq!(count(&store, "schema_fields").await, 1);
        assert_eq!(count(&store, "schema_constraints").await, 0);
        assert_eq!(count(&store, "schema_fk_references").await, 0);
        assert!(store.get_schema_version(v2.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_version_is_none() {
        let store = SchemaStore::in_memory().await.unwrap();
        assert!(store.get_schema_version(42).await.unwrap().is_none());
        assert!(store.get_schema_version_by_name("nope").await.unwrap().is_none());
    }
}
