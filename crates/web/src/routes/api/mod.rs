//! JSON API route handlers.

pub mod pets;
