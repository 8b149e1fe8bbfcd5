//! Routes for one exposed table, limited to its declared methods.
//!
//! `/{base}` carries GET (list) and POST, `/{base}/meta` is routed whenever GET is declared, and
//! `/{base}/:id` carries GET, PUT, PATCH and DELETE. The static meta route wins over `:id`.

use crate::config::Method;
use crate::handlers::resource::{create, delete, list, meta, read, replace, update};
use crate::service::ResourceService;
use axum::{
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;

pub fn resource_routes(service: Arc<ResourceService>) -> Router {
    let model = service.model();
    let base = format!("/{}", model.path_segment);
    let mut router = Router::new();

    let mut collection = MethodRouter::<Arc<ResourceService>>::new();
    if model.allows(Method::Get) {
        collection = collection.get(list);
    }
    if model.allows(Method::Post) {
        collection = collection.post(create);
    }
    if model.allows(Method::Get) || model.allows(Method::Post) {
        router = router.route(&base, collection);
    }

    if model.allows(Method::Get) {
        router = router.route(&format!("{}/meta", base), get(meta));
    }

    let mut item = MethodRouter::<Arc<ResourceService>>::new();
    let mut routed = false;
    for method in &model.methods {
        item = match method {
            Method::Get => item.get(read),
            Method::Put => item.put(replace),
            Method::Patch => item.patch(update),
            Method::Delete => item.delete(delete),
            Method::Post => continue,
        };
        routed = true;
    }
    if routed {
        router = router.route(&format!("{}/:id", base), item);
    }

    router.with_state(service)
}
