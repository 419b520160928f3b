mod campaign;
mod group;
mod lead;
mod query;

pub use campaign::*;
pub use group::*;
pub use lead::*;
pub use query::*;
