pub mod campaign_runner;
pub mod category_search;
pub mod droid;
pub mod exa_client;
pub mod fan_out;
pub mod openai_client;
pub mod query_analyzer;

#[cfg(test)]
pub mod testing;

pub use campaign_runner::*;
pub use category_search::*;
pub use droid::*;
pub use exa_client::*;
pub use fan_out::*;
pub use openai_client::*;
pub use query_analyzer::*;
