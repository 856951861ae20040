//! User accounts service: signup, login, password reset, biography updates,
//! lookup, listing and deletion over HTTP, plus the client-side auth form
//! that drives the login and signup screens.

pub mod app;
pub mod client;
pub mod config;
pub mod state;
pub mod users;
