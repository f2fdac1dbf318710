//! Attachment responses

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::error::ApiResult;
use crate::services::RenderedFile;

/// Whether a rendered download came from the cache (`HIT`) or was just made
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Stream a file from the cache as an attachment
async fn file_attachment(path: &Path, content_type: &str, filename: &str) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = attachment(body, content_type, filename);
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// Stream rendered media, marking cache hits
pub async fn rendered_attachment(
    rendered: &RenderedFile,
    content_type: &str,
    filename: &str,
) -> ApiResult<Response> {
    let mut response = file_attachment(&rendered.path, content_type, filename).await?;
    let status = if rendered.cached { "HIT" } else { "MISS" };
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    Ok(response)
}

/// Generated text as an attachment
pub fn text_attachment(content: String, content_type: &str, filename: &str) -> Response {
    attachment(Body::from(content), content_type, filename)
}

fn attachment(body: Body, content_type: &str, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
