use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON form of a send. Uploads require `multipart/form-data` with the same
/// field names plus `images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}
