//! Renders table definitions back into MySQL DDL.

use crate::ast::{ParsedConstraint, ParsedField, ParsedTable};
#[cfg(not(target_arch = "wasm32"))]
use crate::store::SchemaVersion;

/// Render a stored schema version as a DDL script.
#[cfg(not(target_arch = "wasm32"))]
pub fn to_ddl(version: &SchemaVersion) -> String {
    tables_to_ddl(&version.to_parsed_tables())
}

/// Render tables as `CREATE TABLE` statements followed by one
/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` per foreign key, so every
/// referenced table is declared before any foreign key points at it.
pub fn tables_to_ddl(tables: &[ParsedTable]) -> String {
    let mut output = String::new();

    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        render_table(&mut output, table);
    }

    let mut wrote_header = false;
    for table in tables {
        let mut fk_index = 0;
        for constraint in &table.constraints {
            let ParsedConstraint::ForeignKey {
                name,
                columns,
                references,
            } = constraint
            else {
                continue;
            };
            fk_index += 1;

            if !wrote_header {
                output.push('\n');
                wrote_header = true;
            }
            let name = if name.is_empty() {
                format!("{}_ibfk_{}", table.name, fk_index)
            } else {
                name.clone()
            };
            output.push_str(&format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY {} REFERENCES {} {};\n",
                quote_ident(&table.name),
                quote_ident(&name),
                column_list(columns),
                quote_ident(&references.table),
                column_list(&references.columns),
            ));
        }
    }

    output
}

fn render_table(output: &mut String, table: &ParsedTable) {
    output.push_str(&format!("CREATE TABLE {} (\n", quote_ident(&table.name)));

    let mut lines: Vec<String> = table.fields.iter().map(render_field).collect();
    for constraint in &table.constraints {
        match constraint {
            ParsedConstraint::PrimaryKey { columns } => {
                lines.push(format!("PRIMARY KEY {}", column_list(columns)));
            }
            ParsedConstraint::Unique { name, columns } => {
                lines.push(named_index("UNIQUE KEY", name.as_deref(), columns));
            }
            ParsedConstraint::Key { name, columns } => {
                lines.push(named_index("KEY", name.as_deref(), columns));
            }
            // Emitted after all tables
            ParsedConstraint::ForeignKey { .. } => {}
        }
    }

    for (i, line) in lines.iter().enumerate() {
        output.push_str("    ");
        output.push_str(line);
        if i + 1 < lines.len() {
            output.push(',');
        }
        output.push('\n');
    }
    output.push_str(") ENGINE=InnoDB;\n");
}

fn render_field(field: &ParsedField) -> String {
    let mut line = format!("{} {}", quote_ident(&field.name), field.typ);
    if field.unsigned {
        line.push_str(" UNSIGNED");
    }
    if !field.nullable {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default {
        line.push_str(" DEFAULT ");
        line.push_str(&render_default(default));
    }
    if field.auto_increment {
        line.push_str(" AUTO_INCREMENT");
    }
    line
}

fn render_default(value: &str) -> String {
    let numeric = value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c == '.');
    if value == "NULL" || numeric {
        value.to_string()
    } else {
        quote_literal(value)
    }
}

fn named_index(prefix: &str, name: Option<&str>, columns: &[String]) -> String {
    match name {
        Some(name) => format!("{} {} {}", prefix, quote_ident(name), column_list(columns)),
        None => format!("{} {}", prefix, column_list(columns)),
    }
}

fn column_list(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!("({})", quoted.join(", "))
}

fn escape(value: &str, quote: char) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        if c == quote || c == '\\' {
            s.push('\\');
        }
        s.push(c);
    }
    s
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", escape(name, '`'))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", escape(value, '\''))
}
