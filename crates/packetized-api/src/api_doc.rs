//! OpenAPI document served at `/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::{health, stream, upload};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Packetized API",
        description = "Upload media and play it back as HLS or DASH"
    ),
    paths(
        upload::upload_video,
        stream::stream_video,
        health::health_check,
    ),
    components(schemas(
        upload::UploadResponse,
        stream::StreamResponse,
        health::HealthResponse,
        ErrorResponse,
        packetized_core::StreamFormat,
    )),
    tags(
        (name = "videos", description = "Upload and playback"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
