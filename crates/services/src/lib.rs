pub mod auth;
pub mod call;
pub mod chat;
pub mod clock;
pub mod dao;
pub mod notify;
