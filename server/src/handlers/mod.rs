use crate::connection::ws_index;
use actix_web::web;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));
}
