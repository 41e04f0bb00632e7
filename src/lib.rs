pub mod ast;
pub mod render;
pub mod sql;

#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod store;

use wasm_bindgen::prelude::*;

pub use ast::{ConstraintKind, ForeignKeyTarget, ParsedConstraint, ParsedField, ParsedTable};
pub use sql::{parse_sql, tokenize, SqlParseError};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Parse a DDL script and return its tables as JSON, without storing anything.
#[wasm_bindgen(js_name = "ddlToJson")]
pub fn ddl_to_json(source: &str) -> Result<String, String> {
    let tables = parse_sql(source).map_err(|e| e.to_string())?;
    serde_json::to_string(&tables).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_ddl_to_json_shape() {
        let json = ddl_to_json(
            "CREATE TABLE `users` (`id` INT NOT NULL, UNIQUE KEY `uk_id` (`id`)) ENGINE=InnoDB;",
        )
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!([{
                "table_name": "users",
                "fields": [{
                    "name": "id",
                    "type": "INT",
                    "unsigned": false,
                    "nullable": false,
                    "default": null,
                    "auto_increment": false,
                }],
                "constraints": [{"type": "UNIQUE", "name": "uk_id", "columns": ["id"]}],
            }])
        );
    }

    #[test]
    fn test_ddl_to_json_reports_syntax_errors() {
        let err = ddl_to_json("CREATE TABLE 42 (id INT);").unwrap_err();
        assert!(err.starts_with("Expected table name, found number 42"), "{err}");
    }
}
