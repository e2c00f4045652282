mod generic;
mod projection;

pub use generic::{ Factory, Reconstruct, Repository };
pub use projection::project;
