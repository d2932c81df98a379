//! DDL for mirrored tables

use airport_core::LogicalType;
use airport_schema::TranslatedTable;

use crate::MirrorError;

/// Double-quote an identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// DuckDB column type for a translated column.
pub fn column_type(logical_type: &LogicalType) -> Result<String, MirrorError> {
    match logical_type {
        LogicalType::Table | LogicalType::Any | LogicalType::Null => Err(MirrorError::Unsupported(
            format!("{} cannot be stored in a column", logical_type),
        )),
        LogicalType::List(child) => Ok(format!("{}[]", column_type(child)?)),
        LogicalType::Map { key, value } => {
            Ok(format!("MAP({}, {})", column_type(key)?, column_type(value)?))
        }
        LogicalType::Struct(fields) => {
            let members = fields
                .iter()
                .map(|f| Ok(format!("{} {}", quote_identifier(&f.name), column_type(&f.data_type)?)))
                .collect::<Result<Vec<_>, MirrorError>>()?;
            Ok(format!("STRUCT({})", members.join(", ")))
        }
        other => Ok(other.to_string()),
    }
}

/// Statements that create `schema.table` from `definition`, in execution
/// order: the schema, the table, then comments.
pub fn create_table_statements(
    schema: &str,
    table: &str,
    definition: &TranslatedTable,
    comment: Option<&str>,
) -> Result<Vec<String>, MirrorError> {
    if definition.columns.is_empty() {
        return Err(MirrorError::Unsupported(format!(
            "table '{}' has no columns",
            table
        )));
    }
    let name = qualified_name(schema, table);

    let mut body = Vec::with_capacity(definition.columns.len());
    for (index, column) in definition.columns.iter().enumerate() {
        let mut line = format!(
            "{} {}",
            quote_identifier(&column.name),
            column_type(&column.logical_type)?
        );
        if definition.is_not_null(index) {
            line.push_str(" NOT NULL");
        }
        if let Some(default_expr) = &column.default_expr {
            line.push_str(" DEFAULT ");
            line.push_str(default_expr);
        }
        body.push(line);
    }
    for (index, column) in definition.columns.iter().enumerate() {
        let unique = definition
            .constraints
            .iter()
            .any(|c| matches!(c, airport_schema::Constraint::Unique(i) if *i == index));
        if unique {
            body.push(format!("UNIQUE ({})", quote_identifier(&column.name)));
        }
    }
    for expr in definition.check_expressions() {
        body.push(format!("CHECK ({})", expr));
    }

    let mut statements = vec![
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema)),
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", name, body.join(",\n    ")),
    ];
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        statements.push(format!("COMMENT ON TABLE {} IS {}", name, quote_literal(comment)));
    }
    for column in &definition.columns {
        if let Some(comment) = &column.comment {
            statements.push(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                name,
                quote_identifier(&column.name),
                quote_literal(comment)
            ));
        }
    }
    Ok(statements)
}
