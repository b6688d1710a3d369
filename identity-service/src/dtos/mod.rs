pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic error body. Every response also carries the request's
/// correlation id in the `x-request-id` header.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Could not validate credentials")]
    pub error: String,
}
