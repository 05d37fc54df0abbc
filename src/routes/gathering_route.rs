use std::convert::Infallible;

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::routes::AuthenticatedUser;
use crate::services::{fan_out, ExaClient, OpenaiClient};

#[derive(Deserialize)]
pub struct GatheringStreamQuery {
    query: String,
    /// Comma-separated region list.
    regions: String,
    /// Comma-separated industry list.
    industries: String,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Incremental gatherings search over server-sent events: one frame per
/// region/industry pair, then a terminal frame with the aggregated results.
#[get("/gatherings/stream")]
async fn stream_gathering_search(
    _user: AuthenticatedUser,
    openai_client: web::Data<OpenaiClient>,
    exa_client: web::Data<ExaClient>,
    params: web::Query<GatheringStreamQuery>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    if params.query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }
    let regions = split_list(&params.regions);
    let industries = split_list(&params.industries);
    if regions.is_empty() || industries.is_empty() {
        return Err(ApiError::Validation(
            "regions and industries must not be empty".to_string(),
        ));
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = fan_out::stream_gatherings(
            openai_client.get_ref(),
            exa_client.get_ref(),
            &params.query,
            &regions,
            &industries,
            &tx,
        )
        .await
        {
            log::error!("Gatherings stream failed: {:?}", e);
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_default();
        Ok::<web::Bytes, Infallible>(web::Bytes::from(format!("data: {json}\n\n")))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(stream))
}
