//! Database entities

pub mod request;

pub use request::Entity as Request;
