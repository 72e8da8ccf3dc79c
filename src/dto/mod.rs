pub mod auth;
pub mod chatbot;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod users;
