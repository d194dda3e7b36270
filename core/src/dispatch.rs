//! The dispatch step: the fixed stage between the request and response
//! interceptors.
//!
//! # Design
//! Cancellation is checked before anything runs and again once the adapter
//! settles, so a cancel that lands mid-transport still decides the outcome
//! even when the adapter itself cannot abort. An error that already is a
//! cancellation skips both the re-check and the response transforms.

use serde_json::Value;

use crate::adapter::default_adapter;
use crate::config::{transform_data, RequestConfig};
use crate::error::Result;
use crate::http::Response;

/// Send one request through its adapter and normalize the outcome.
#[tracing::instrument(skip_all, fields(method = tracing::field::Empty, url = ?config.url))]
pub async fn dispatch(mut config: RequestConfig) -> Result<Response> {
    config.throw_if_cancellation_requested()?;

    let method = config.method.unwrap_or_default();
    tracing::Span::current().record("method", method.as_str());

    let data = config.data.take().unwrap_or(Value::Null);
    let transforms = config.transform_request.take().unwrap_or_default();
    let data = transform_data(data, &mut config.headers, &transforms).await?;
    config.data = (!data.is_null()).then_some(data);
    config.transform_request = Some(transforms);

    config.headers = config.headers.flatten(method);

    let adapter = match &config.adapter {
        Some(adapter) => adapter.clone(),
        None => {
            tracing::debug!("no adapter configured, using default");
            default_adapter()
        }
    };

    let cancel_token = config.cancel_token.clone();
    let response_transforms = config.transform_response.clone().unwrap_or_default();
    let check_cancel = || match &cancel_token {
        Some(token) => token.throw_if_requested(),
        None => Ok(()),
    };

    match adapter.send(config).await {
        Ok(mut response) => {
            check_cancel()?;
            let data = std::mem::take(&mut response.data);
            response.data =
                transform_data(data, &mut response.headers, &response_transforms).await?;
            tracing::debug!(status = response.status, "request settled");
            Ok(response)
        }
        Err(mut error) => {
            if !error.is_cancel() {
                check_cancel()?;
                if let Some(response) = error.response_mut() {
                    let data = std::mem::take(&mut response.data);
                    response.data =
                        transform_data(data, &mut response.headers, &response_transforms).await?;
                }
            }
            tracing::debug!(%error, "request failed");
            Err(error)
        }
    }
}
