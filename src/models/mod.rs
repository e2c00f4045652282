pub mod common;
pub mod entity;

pub use common::{ Filter, Row, Value };
pub use entity::{ Entity, Persistable };
