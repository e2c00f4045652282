use crate::models::Row;
use crate::utils::logging::log_debug;

/// Persistable projection of a property bag.
///
/// Walks `columns` in declared order and copies each one present in `props`;
/// props that are not declared are dropped. Structured values are turned into
/// JSON text. With `ignore_primary_key` the key column is left out, which is
/// what an UPDATE's SET clause needs.
pub fn project(props: &Row, columns: &[String], primary_key: &str, ignore_primary_key: bool) -> Row {
    let mut row = Row::new();

    for column in columns {
        if ignore_primary_key && column == primary_key {
            continue;
        }
        if let Some(value) = props.get(column) {
            row.insert(column.clone(), value.clone().into_scalar());
        }
    }

    let dropped: Vec<&String> = props
        .fields()
        .filter(|field| !columns.contains(field))
        .collect();
    if !dropped.is_empty() {
        log_debug("projection", "Dropping undeclared fields", &dropped);
    }

    row
}
