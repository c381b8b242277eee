pub mod connection;
pub mod query;

pub use connection::*;
pub use query::*;
