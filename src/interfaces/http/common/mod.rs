//! Shared HTTP building blocks: response envelope, error mapping,
//! extractors.

mod error;
mod identity;
mod response;
mod validated_json;

pub use error::{status_for, ApiError, ApiResult};
pub use identity::{RequesterId, USER_ID_HEADER};
pub use response::ApiResponse;
pub use validated_json::{ValidatedJson, ValidatedJsonRejection};
