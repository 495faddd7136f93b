//! CREATE TABLE statements for entity and join tables.

use relgraph_core::{Column, HasManySpec, ManyToManySpec, ObjectType, SqlType, quote_ident};

fn column_definition(column: &Column) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.sql_type.sql_name());
    if column.primary_key {
        def.push_str(" PRIMARY KEY");
        if column.auto_increment {
            def.push_str(" AUTOINCREMENT");
        }
    } else if column.not_null {
        def.push_str(" NOT NULL");
    }
    def
}

/// Build the CREATE TABLE statement of an entity table.
///
/// `contained_in` lists the has-many relations where this type is the
/// contained side; each implicit through column is appended as a nullable
/// column of the container's key type unless a column of that name already
/// exists.
pub fn create_table(object_type: &ObjectType, contained_in: &[HasManySpec]) -> String {
    let mut names: Vec<&str> = Vec::new();
    let mut defs: Vec<String> = Vec::new();

    for column in object_type.columns() {
        names.push(&column.name);
        defs.push(column_definition(column));
    }

    for spec in contained_in {
        if spec.contained.entity_type_id() != object_type.entity_type_id() {
            continue;
        }
        if names.contains(&spec.through_column.as_str()) {
            continue;
        }
        names.push(&spec.through_column);
        defs.push(column_definition(&Column::implicit_foreign_key(
            spec.through_column.clone(),
            key_type(&spec.container),
        )));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(object_type.table_name()),
        defs.join(", ")
    )
}

fn key_type(object_type: &ObjectType) -> SqlType {
    object_type
        .primary_key()
        .map_or(SqlType::Integer, |k| k.sql_type)
}

/// Build the CREATE TABLE statement of a many-to-many join table.
pub fn create_link_table(spec: &ManyToManySpec) -> String {
    let (first_col, second_col) = spec.join_columns();
    let (first, second) = if spec.first.table_name() <= spec.second.table_name() {
        (&spec.first, &spec.second)
    } else {
        (&spec.second, &spec.first)
    };
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {} NOT NULL, {} {} NOT NULL, PRIMARY KEY ({}, {}))",
        quote_ident(&spec.join_table()),
        quote_ident(&first_col),
        key_type(first).sql_name(),
        quote_ident(&second_col),
        key_type(second).sql_name(),
        quote_ident(&first_col),
        quote_ident(&second_col),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_entities::{Author, Book, Tag, registry};
    use relgraph_core::{Entity, EntityDef, Field, HasMany, Registry};

    #[test]
    fn entity_table_with_auto_increment_key() {
        let registry = registry();
        let author = registry.object_type::<Author>().unwrap();
        let sql = create_table(&author, &registry.contained_in::<Author>().unwrap());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"author\" (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL, \"born\" INTEGER)"
        );
    }

    #[test]
    fn contained_table_gets_implicit_through_column() {
        let registry = registry();
        let book = registry.object_type::<Book>().unwrap();
        let sql = create_table(&book, &registry.contained_in::<Book>().unwrap());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"book\" (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"title\" TEXT, \"author_id\" INTEGER)"
        );
    }

    #[derive(Debug, Default)]
    struct Shelf {
        label: String,
        items: Vec<Item>,
    }

    impl Entity for Shelf {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("shelf")
                .field(
                    Field::new("label", |s: &Shelf| &s.label, |s: &mut Shelf| &mut s.label)
                        .primary_key(),
                )
                .has_many(HasMany::new(
                    "items",
                    |s: &Shelf| &s.items,
                    |s: &mut Shelf| &mut s.items,
                ))
        }
    }

    #[derive(Debug, Default)]
    struct Item {
        id: i64,
    }

    impl Entity for Item {
        fn entity() -> EntityDef<Self> {
            EntityDef::new("item")
                .field(Field::new("id", |i: &Item| &i.id, |i: &mut Item| &mut i.id).primary_key())
                .belongs_to::<Shelf>()
        }
    }

    #[test]
    fn through_column_follows_a_text_key() {
        let registry = Registry::builder().register::<Shelf>().build().unwrap();
        let item = registry.object_type::<Item>().unwrap();
        let sql = create_table(&item, &registry.contained_in::<Item>().unwrap());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"item\" (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"shelf_id\" TEXT)"
        );
    }

    #[test]
    fn join_table() {
        let registry = registry();
        let spec = registry.many_to_many::<Tag>().unwrap().remove(0);
        assert_eq!(
            create_link_table(&spec),
            "CREATE TABLE IF NOT EXISTS \"author_tag\" (\"author_id\" INTEGER NOT NULL, \"tag_id\" TEXT NOT NULL, PRIMARY KEY (\"author_id\", \"tag_id\"))"
        );
    }
}
