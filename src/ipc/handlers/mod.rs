pub mod auth;
pub mod classes;
pub mod content;
pub mod core;
pub mod identities;
pub mod import;
pub mod settings;
pub mod students;
