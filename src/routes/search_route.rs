use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::dal::{PgSearchStore, SearchStore};
use crate::domain::analysis::{ProfessionSet, RegionSet, SearchPlan};
use crate::domain::category::{Category, SearchType};
use crate::error::ApiError;
use crate::routes::AuthenticatedUser;
use crate::services::{fan_out, ExaClient, OpenaiClient};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSearchRequest {
    query: String,
    regions: RegionSet,
    professions: ProfessionSet,
    selected_categories: Vec<Category>,
    #[serde(default)]
    search_type: SearchType,
}

/// Finalize a plan: fan out across the selected category modules and persist
/// the aggregate as a new search.
#[post("/searches/run")]
async fn run_search(
    user: AuthenticatedUser,
    openai_client: web::Data<OpenaiClient>,
    exa_client: web::Data<ExaClient>,
    store: web::Data<PgSearchStore>,
    body: web::Json<RunSearchRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    if body.query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }
    if body.selected_categories.is_empty() {
        return Err(ApiError::Validation(
            "at least one category must be selected".to_string(),
        ));
    }

    let plan = SearchPlan {
        base_query: body.query,
        regions: body.regions,
        professions: body.professions,
        selected_categories: body.selected_categories,
        search_type: body.search_type,
    };
    let search = fan_out::run_plan(
        openai_client.get_ref(),
        exa_client.get_ref(),
        store.get_ref(),
        user.user_id,
        &plan,
        None,
    )
    .await?;

    Ok(HttpResponse::Ok().json(search))
}

#[get("/searches")]
async fn list_searches(
    user: AuthenticatedUser,
    store: web::Data<PgSearchStore>,
) -> Result<HttpResponse, ApiError> {
    let searches = store.list_searches(user.user_id).await?;
    Ok(HttpResponse::Ok().json(searches))
}

#[get("/searches/{id}")]
async fn get_search(
    user: AuthenticatedUser,
    store: web::Data<PgSearchStore>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let search = store
        .get_search(*path, user.user_id)
        .await?
        .ok_or(ApiError::NotFound("search"))?;
    Ok(HttpResponse::Ok().json(search))
}
