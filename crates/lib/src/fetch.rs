use crate::errors::ReadError;
use reqwest::{RequestBuilder, StatusCode};
use tracing::{debug, info};

/// Sends `request` and returns the response body.
///
/// 404 maps to [`ReadError::NotFound`], 401 and 403 to
/// [`ReadError::Unauthorized`], any other failure status to [`ReadError::Fetch`]
/// with the response body attached.
pub async fn download(request: RequestBuilder) -> Result<Vec<u8>, ReadError> {
    let response = request.send().await?;
    let url = response.url().to_string();
    let status = response.status();
    info!("GET {url} -> {status}");

    if status.is_success() {
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {url}", bytes.len());
        return Ok(bytes.to_vec());
    }

    match status {
        StatusCode::NOT_FOUND => Err(ReadError::NotFound(url)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ReadError::Unauthorized {
            status: status.as_u16(),
            url,
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ReadError::Fetch {
                url,
                status: status.as_u16(),
                body,
            })
        }
    }
}
