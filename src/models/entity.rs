use crate::error::RepoResult;
use crate::models::common::Row;

/// Anything that carries a flat property bag that can be written to a table.
pub trait Persistable {
    fn props(&self) -> Row;
}

/// A declared domain type with a fixed set of columns.
///
/// `COLUMNS` is the schema descriptor used to build the persistable
/// projection: values of any other property are never written, which is what
/// lets an extended type (one whose props add fields on top of an entity's)
/// be stored through the entity's repository.
pub trait Entity: Persistable + Sized {
    const COLUMNS: &'static [&'static str];

    /// Rebuild an instance from a row read back from the store
    fn from_row(row: Row) -> RepoResult<Self>;
}

impl Persistable for Row {
    fn props(&self) -> Row {
        self.clone()
    }
}

impl<T: Persistable + ?Sized> Persistable for &T {
    fn props(&self) -> Row {
        (**self).props()
    }
}
