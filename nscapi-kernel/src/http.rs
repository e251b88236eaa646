/**
 * API REST NSCAPI - Serveur HTTP du kernel
 *
 * ROUTES :
 * - GET /               page d'usage (templates_root/root.html si présent)
 * - GET /api/reports    tous les checks de tous les hosts + champs custom
 * - GET /health         "ok"
 * - GET /system/health  compteurs du kernel (cache, file, MQTT)
 *
 * Les handlers ne font que lire : snapshot du cache + resolve des champs.
 */

use crate::cache::StatusCache;
use crate::custom::CustomFieldStore;
use crate::health::{HealthTracker, KernelHealth};
use crate::queue::CheckQueue;
use crate::report::{build_report, ReportEntry};
use axum::extract::State;
use axum::response::Html;
use axum::{routing::get, Json, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_ROOT_PAGE: &str = "<html><body><h1>nscapi</h1><ul>\
<li><code>GET /api/reports</code>: last result of every check, with its custom fields</li>\
<li><code>GET /system/health</code>: kernel counters</li>\
</ul></body></html>";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StatusCache>,
    pub fields: Arc<CustomFieldStore>,
    pub queue: CheckQueue,
    pub health_tracker: HealthTracker,
    pub templates_root: PathBuf,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root_page))
        .route("/api/reports", get(get_reports))
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .with_state(app_state)
}

// GET /
async fn root_page(State(app): State<AppState>) -> Html<String> {
    let path = app.templates_root.join("root.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(e) => {
            debug!("[http] {} unavailable ({}), serving built-in page", path.display(), e);
            Html(DEFAULT_ROOT_PAGE.to_string())
        }
    }
}

// GET /api/reports
async fn get_reports(State(app): State<AppState>) -> Json<Vec<ReportEntry>> {
    Json(build_report(&app.cache, &app.fields))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.cache, &app.queue, &app.fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::FieldClassifier;
    use crate::models::FieldSet;
    use crate::queue::channel;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(templates_root: PathBuf) -> (Router, Arc<StatusCache>) {
        let cache = Arc::new(StatusCache::new());
        let (queue, _worker) = channel(cache.clone());
        let mut fields = CustomFieldStore::new();
        let mut common = FieldSet::new();
        common.insert("team".into(), json!("ops"));
        fields.insert(FieldClassifier::common(), common);

        let state = AppState {
            cache: cache.clone(),
            fields: Arc::new(fields),
            queue,
            health_tracker: HealthTracker::new(),
            templates_root,
        };
        (build_router(state), cache)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_reports_route() {
        let (router, cache) = app(PathBuf::from("/nonexistent"));
        cache.update("host01", "disk", "DISK WARNING\n/var 91%", 1484527962, 1);

        let (status, body) = get_body(router, "/api/reports").await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            v,
            json!([{
                "check": {
                    "host": "host01",
                    "name": "disk",
                    "status": "Warning",
                    "message": "DISK WARNING /var 91%",
                    "timestamp": "1484527962",
                    "statusFirstSeen": "1484527962"
                },
                "custom": {"team": "ops"}
            }])
        );
    }

    #[tokio::test]
    async fn test_health_routes() {
        let (router, cache) = app(PathBuf::from("/nonexistent"));
        cache.update("host01", "disk", "OK", 1, 0);

        let (status, body) = get_body(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, body) = get_body(router, "/system/health").await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["hosts_tracked"], 1);
        assert_eq!(v["custom_classifiers"], 1);
    }

    #[tokio::test]
    async fn test_root_page() {
        let (router, _) = app(PathBuf::from("/nonexistent"));
        let (status, body) = get_body(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/api/reports"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("root.html"), "<p>custom usage</p>").unwrap();
        let (router, _) = app(dir.path().to_path_buf());
        let (_, body) = get_body(router, "/").await;
        assert_eq!(body, "<p>custom usage</p>");
    }
}
