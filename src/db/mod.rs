pub mod aggregates;
pub mod connection;
pub mod donations;
pub mod engagement;
pub mod publications;
pub mod users;

pub use connection::{init_db, Database};
