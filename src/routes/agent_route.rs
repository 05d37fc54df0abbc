use actix_web::{post, web, HttpResponse};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::AuthenticatedUser;
use crate::services::{query_analyzer, OpenaiClient};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    query: String,
    #[serde(default)]
    user_profile: String,
}

/// Plan-confirmation step: analyze the query (falling back to the profile),
/// expand regions and audiences, and return the editable plan material.
#[post("/agent")]
async fn agent(
    _user: AuthenticatedUser,
    openai_client: web::Data<OpenaiClient>,
    body: web::Json<AgentRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }

    let response =
        query_analyzer::run_agent(openai_client.get_ref(), &body.query, &body.user_profile)
            .await?;
    Ok(HttpResponse::Ok().json(response))
}
