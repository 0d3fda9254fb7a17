pub mod admin;
pub mod health;
pub mod me;
pub mod records;
