pub mod call_history;
pub mod matches;
pub mod message;

pub use call_history::*;
pub use matches::*;
pub use message::*;
