pub mod base;
pub mod call_history;
pub mod match_store;
