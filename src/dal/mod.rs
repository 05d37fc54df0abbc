pub mod search_db;
pub mod session_db;

pub use search_db::{PgSearchStore, SearchStore};
