mod auth;
mod error;
mod pricing;
mod schema;
mod service;
mod store;

pub use auth::*;
pub use error::*;
pub use pricing::*;
pub use schema::*;
pub use service::*;
pub use store::*;
