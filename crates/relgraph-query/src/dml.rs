//! INSERT, UPDATE and DELETE statements derived from entity models.

use crate::statement::{Statement, placeholders};
use relgraph_core::{
    ConstraintErrorKind, EntityModel, Error, LinkTable, MappedField, Result, Value, quote_ident,
};
use std::any::Any;

fn check_not_null(model: &EntityModel, field: &MappedField, value: &Value) -> Result<()> {
    if value.is_null() && field.column.not_null {
        return Err(Error::constraint(
            ConstraintErrorKind::NullColumn,
            model.table_name(),
            &field.column.name,
        ));
    }
    Ok(())
}

/// Build the INSERT statement for `instance`.
///
/// Columns are bound in declared order, followed by `extra` columns not
/// already declared (implicit through columns). An auto-increment key left
/// unset is omitted so the database assigns it.
pub fn insert(
    model: &EntityModel,
    instance: &dyn Any,
    extra: &[(String, Value)],
) -> Result<Statement> {
    let mut columns: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for field in model.fields() {
        let value = field.access.read(instance)?;
        if field.column.primary_key && value.is_default() {
            if field.column.auto_increment {
                continue;
            }
            return Err(Error::constraint(
                ConstraintErrorKind::UnsetPrimaryKey,
                model.table_name(),
                &field.column.name,
            ));
        }
        check_not_null(model, field, &value)?;
        columns.push(&field.column.name);
        params.push(value);
    }

    for (column, value) in extra {
        if !columns.contains(&column.as_str()) {
            columns.push(column);
            params.push(value.clone());
        }
    }

    let table = quote_ident(model.table_name());
    let sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            quoted.join(", "),
            placeholders(params.len())
        )
    };
    Ok(Statement { sql, params })
}

/// Build the UPDATE statement for `instance`, identified by its primary key.
pub fn update(
    model: &EntityModel,
    instance: &dyn Any,
    extra: &[(String, Value)],
) -> Result<Statement> {
    let key_field = model.require_primary_key()?;
    let key = key_field.access.read(instance)?;

    let mut sets: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    for field in model.fields().iter().filter(|f| !f.column.primary_key) {
        let value = field.access.read(instance)?;
        check_not_null(model, field, &value)?;
        sets.push(format!("{} = ?", quote_ident(&field.column.name)));
        params.push(value);
    }
    for (column, value) in extra {
        if model.field_for_column(column).is_none() {
            sets.push(format!("{} = ?", quote_ident(column)));
            params.push(value.clone());
        }
    }

    let key_column = quote_ident(&key_field.column.name);
    if sets.is_empty() {
        sets.push(format!("{key_column} = {key_column}"));
    }
    params.push(key);

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {key_column} = ?",
            quote_ident(model.table_name()),
            sets.join(", ")
        ),
        params,
    })
}

/// Delete one row by primary key.
pub fn delete_by_key(model: &EntityModel, key: Value) -> Result<Statement> {
    let key_field = model.require_primary_key()?;
    Ok(Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(model.table_name()),
        quote_ident(&key_field.column.name)
    ))
    .bind(key))
}

/// Delete the rows of a contained table owned by `parent_key`.
pub fn delete_children(table: &str, through_column: &str, parent_key: Value) -> Statement {
    Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(table),
        quote_ident(through_column)
    ))
    .bind(parent_key)
}

/// Delete every row of a table.
pub fn delete_all(table: &str) -> Statement {
    Statement::new(format!("DELETE FROM {}", quote_ident(table)))
}

/// Insert one join row, ignoring an existing identical pair.
pub fn link_insert(link: &LinkTable, local: Value, remote: Value) -> Statement {
    Statement::new(format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        quote_ident(&link.table_name),
        quote_ident(&link.local_column),
        quote_ident(&link.remote_column)
    ))
    .bind(local)
    .bind(remote)
}

/// Remove every join row referencing `local` on the local side.
pub fn unlink_all(link: &LinkTable, local: Value) -> Statement {
    Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(&link.table_name),
        quote_ident(&link.local_column)
    ))
    .bind(local)
}
