//! Shared GET-then-decode step used by every fetcher

use crate::error::FetchError;
use confgen_net::{CancellationToken, GetRequest, HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Send `request`, require `200 OK`, decode the body as `T`
///
/// The response body is owned here and released on every return path.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &HttpClient,
    request: GetRequest,
    cancel: &CancellationToken,
) -> Result<T, FetchError> {
    let url = request.url().clone();
    let response = client.get(request, cancel).await?;

    debug!(
        "{} answered {} with {} bytes in {:?}",
        url,
        response.status,
        response.body.len(),
        response.total_time
    );

    if response.status != StatusCode::OK {
        return Err(FetchError::UnexpectedStatus {
            status: response.status.as_u16(),
        });
    }

    serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
}
