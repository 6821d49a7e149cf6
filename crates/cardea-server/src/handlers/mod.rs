pub mod auth;
pub mod cards;
pub mod functions;
pub mod users;
