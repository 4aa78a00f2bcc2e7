//! External interfaces
//!
//! - `http`: REST API with Swagger documentation
//! - `ws`: live change notifications

pub mod http;
pub mod ws;
