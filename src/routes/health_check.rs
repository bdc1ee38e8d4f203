use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness only: answers 200 with an empty body without touching the store.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
