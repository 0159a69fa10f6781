pub mod call;
pub mod chat;
pub mod message;
pub mod moderation;
pub mod reaction;
