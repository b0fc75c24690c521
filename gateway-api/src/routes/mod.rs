use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod applications;
pub mod clusters;
pub mod health_check;
pub mod metrics;
pub mod resources;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorMessage {
    #[schema(example = "an error occurred in the api")]
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Gardener Shoot created successfully")]
    pub message: String,
}
