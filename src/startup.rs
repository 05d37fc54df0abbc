use std::net::TcpListener;

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::PgPool;

use crate::{
    configuration::WebdriverSettings,
    dal::PgSearchStore,
    routes::{agent_route, campaign_route, default_route, gathering_route, search_route},
    services::{ExaClient, OpenaiClient},
};

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    openai_client: OpenaiClient,
    exa_client: ExaClient,
    webdriver: WebdriverSettings,
) -> Result<Server, std::io::Error> {
    let store = Data::new(PgSearchStore::new(db_pool.clone()));
    let db_pool = web::Data::new(db_pool);
    let openai_client = web::Data::new(openai_client);
    let exa_client = web::Data::new(exa_client);
    let webdriver = web::Data::new(webdriver);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(agent_route::agent)
            .service(search_route::run_search)
            .service(search_route::list_searches)
            .service(search_route::get_search)
            .service(campaign_route::run_search_campaign)
            .service(gathering_route::stream_gathering_search)
            .app_data(db_pool.clone())
            .app_data(store.clone())
            .app_data(openai_client.clone())
            .app_data(exa_client.clone())
            .app_data(webdriver.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
