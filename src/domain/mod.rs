pub mod analysis;
pub mod campaign;
pub mod category;
pub mod search;
