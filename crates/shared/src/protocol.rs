use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const GENERATE_PATH: &str = "generate/2-bit-pixel-art";

pub const FIELD_IMAGE: &str = "image";
pub const FIELD_COLOR_PALETTE: &str = "color_palette";
pub const FIELD_PIXEL_SIZE: &str = "pixel_size";

/// How long the service keeps a generated result before deleting it.
pub const RESULT_RETENTION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
