use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;

use whiteboard_server::handlers::root;
use whiteboard_server::server::spawn_server;
use whiteboard_server::settings::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();
    let bind_to = (settings.host.clone(), settings.port);
    log::info!("Relay listening on {}:{}", bind_to.0, bind_to.1);

    let srv_tx = web::Data::new(spawn_server(settings.max_connections));
    let settings = web::Data::new(settings);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(srv_tx.clone())
            .app_data(settings.clone())
            .configure(root)
    })
    .bind(bind_to)?
    .run()
    .await
}
