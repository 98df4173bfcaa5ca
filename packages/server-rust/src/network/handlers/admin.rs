//! Dataset administration under `/$/datasets`.
//!
//! Listing is open. Adding and removing datasets requires an identity from
//! `ServerConfig::admin_users`, taken from the configured user header.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::{header_user, AppState};
use crate::service::action::ActionError;
use crate::service::dataset::DataAccessPoint;
use crate::service::error::ConfigError;
use crate::setup::DatasetConfig;

#[derive(Debug, Serialize)]
pub struct EndpointSummary {
    pub name: String,
    pub operation: String,
    pub handler: Option<&'static str>,
}

/// One entry of `GET /$/datasets`.
#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub state: &'static str,
    pub access_controlled: bool,
    pub endpoints: Vec<EndpointSummary>,
}

impl From<&DataAccessPoint> for DatasetSummary {
    fn from(access_point: &DataAccessPoint) -> Self {
        let service = access_point.data_service();
        let mut endpoints: Vec<EndpointSummary> = service
            .endpoints()
            .map(|e| EndpointSummary {
                name: e.name().to_string(),
                operation: e.operation().id().to_string(),
                handler: e.handler().map(|h| h.name()),
            })
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name: access_point.name().to_string(),
            state: service.state().as_str(),
            access_controlled: service.dataset().is_access_controlled(),
            endpoints,
        }
    }
}

/// `GET /$/datasets`
pub async fn list_datasets_handler(State(state): State<AppState>) -> Json<Vec<DatasetSummary>> {
    let mut datasets: Vec<DatasetSummary> = state
        .context
        .datasets()
        .snapshot()
        .iter()
        .map(|dap| DatasetSummary::from(dap.as_ref()))
        .collect();
    datasets.sort_by(|a, b| a.name.cmp(&b.name));
    Json(datasets)
}

fn require_admin(state: &AppState, headers: &HeaderMap, action: &str) -> Result<(), ActionError> {
    let user = header_user(state, headers);
    if state.context.config().is_admin(user) {
        return Ok(());
    }
    warn!(user = user.unwrap_or("<anonymous>"), action, "admin request refused");
    Err(ActionError::AccessDenied {
        message: format!("{action} requires an administrator"),
    })
}

/// `POST /$/datasets` with a JSON [`DatasetConfig`].
pub async fn add_dataset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<DatasetConfig>,
) -> Response {
    if let Err(e) = require_admin(&state, &headers, "adding a dataset") {
        return e.into_response();
    }
    match state.context.add_dataset(&config).await {
        Ok(access_point) => (
            StatusCode::CREATED,
            Json(DatasetSummary::from(access_point.as_ref())),
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                ConfigError::DuplicateDataset { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// `DELETE /$/datasets/{name}`
pub async fn remove_dataset_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = require_admin(&state, &headers, "removing a dataset") {
        return e.into_response();
    }
    if state.context.remove_dataset(&name).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::tests::test_state;

    fn as_user(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", user.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn lists_registered_datasets() {
        let state = test_state().await;
        let Json(list) = list_datasets_handler(State(state)).await;

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "ds1");
        assert_eq!(list[0].state, "active");
        assert!(!list[0].access_controlled);
        let names: Vec<_> = list[0].endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["data", "sparql"]);
        assert_eq!(list[0].endpoints[0].handler, Some("gsp-rw"));
    }

    #[tokio::test]
    async fn add_then_remove() {
        let state = test_state().await;
        let config = DatasetConfig::new("ds2").endpoint("sparql", "query");

        let response = add_dataset_handler(State(state.clone()), as_user("root"), Json(config.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(state.context.datasets().get("ds2").unwrap().data_service().is_active());

        let response = add_dataset_handler(State(state.clone()), as_user("root"), Json(config)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response =
            remove_dataset_handler(State(state.clone()), Path("ds2".to_string()), as_user("root")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = remove_dataset_handler(State(state), Path("ds2".to_string()), as_user("root")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_config_is_bad_request() {
        let state = test_state().await;
        let config = DatasetConfig::new("ds3").endpoint("x", "teleport");
        let response = add_dataset_handler(State(state.clone()), as_user("root"), Json(config)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.context.datasets().contains("ds3"));
    }

    #[tokio::test]
    async fn mutations_require_an_admin() {
        let state = test_state().await;

        for headers in [HeaderMap::new(), as_user("alice")] {
            let response =
                remove_dataset_handler(State(state.clone()), Path("ds1".to_string()), headers.clone()).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);

            let config = DatasetConfig::new("ds2").endpoint("sparql", "query");
            let response = add_dataset_handler(State(state.clone()), headers, Json(config)).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        assert!(state.context.datasets().get("ds1").unwrap().data_service().is_active());
        assert!(!state.context.datasets().contains("ds2"));
    }
}
