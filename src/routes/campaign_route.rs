use std::sync::atomic::AtomicBool;

use actix_web::{post, web, HttpResponse};
use uuid::Uuid;

use crate::configuration::WebdriverSettings;
use crate::dal::{PgSearchStore, SearchStore};
use crate::error::ApiError;
use crate::routes::AuthenticatedUser;
use crate::services::{campaign_runner, Droid, OpenaiClient};

/// Runs the contact campaign over a search's people list. Progress is
/// observable by polling the search row while this request is in flight.
#[post("/searches/{id}/campaign")]
async fn run_search_campaign(
    user: AuthenticatedUser,
    store: web::Data<PgSearchStore>,
    openai_client: web::Data<OpenaiClient>,
    webdriver: web::Data<WebdriverSettings>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let search = store
        .get_search(*path, user.user_id)
        .await?
        .ok_or(ApiError::NotFound("search"))?;

    let droid = Droid::new(&webdriver.url).await?;
    let cancel = AtomicBool::new(false);
    let outcome = campaign_runner::run_campaign(
        store.get_ref(),
        &droid,
        openai_client.get_ref(),
        &search,
        &cancel,
    )
    .await;

    // The session must go down even when the campaign errored.
    if let Err(e) = droid.quit().await {
        log::error!("Failed to close browser session: {:?}", e);
    }

    let entries = outcome?;
    Ok(HttpResponse::Ok().json(entries))
}
