//! Query string handling: the declarative rule middleware and the raw
//! parameter extractor handlers read from.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{Uri, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::domain::{EntityCategory, FieldRule, QueryRules};

use super::error::ApiError;

/// Largest search radius accepted by the nearby endpoint, in metres.
pub const MAX_RADIUS_M: f64 = 50_000.0;

fn parse_query(uri: &Uri) -> Result<HashMap<String, String>, ApiError> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri)?;
    Ok(params)
}

/// Raw query parameters with blank values treated as absent.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(pub HashMap<String, String>);

impl QueryParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for QueryParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_query(&parts.uri).map(Self)
    }
}

/// Rejects the request with every rule violation, or passes it on untouched.
pub async fn enforce_query_rules(
    State(rules): State<Arc<QueryRules>>,
    request: Request,
    next: Next,
) -> Response {
    let params = match parse_query(request.uri()) {
        Ok(params) => params,
        Err(err) => return err.into_response(),
    };
    match rules.check(&params) {
        Ok(()) => next.run(request).await,
        Err(errors) => ApiError::Invalid(errors).into_response(),
    }
}

fn category_rule() -> FieldRule {
    FieldRule::string().one_of(EntityCategory::ALL.iter().map(EntityCategory::as_str))
}

/// `GET /api/entities`
pub fn entity_list_rules() -> QueryRules {
    QueryRules::new()
        .field("type", category_rule())
        .field("bbox", FieldRule::string().max(200.0))
}

/// `GET /api/entities/{id}/history`
pub fn history_rules() -> QueryRules {
    QueryRules::new()
        .field("from", FieldRule::string().required())
        .field("to", FieldRule::string().required())
}

/// `GET /api/geo/nearby`
pub fn nearby_rules() -> QueryRules {
    QueryRules::new()
        .field("lat", FieldRule::number().required().range(-90.0, 90.0))
        .field("lon", FieldRule::number().required().range(-180.0, 180.0))
        .field("radius", FieldRule::number().range(1.0, MAX_RADIUS_M))
        .field("type", category_rule())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, middleware, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(rules: QueryRules) -> Router {
        Router::new()
            .route("/", get(|| async { StatusCode::OK }))
            .layer(middleware::from_fn_with_state(
                Arc::new(rules),
                enforce_query_rules,
            ))
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_missing_lat_and_lon_reported_together() {
        let (status, body) = call(app(nearby_rules()), "/").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"errors": ["lat is required", "lon is required"]})
        );
    }

    #[tokio::test]
    async fn test_valid_query_passes_through() {
        let (status, _) = call(app(nearby_rules()), "/?lat=10.77&lon=106.69&radius=500").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_every_violation_is_accumulated() {
        let (status, body) = call(
            app(nearby_rules()),
            "/?lat=abc&lon=200&radius=0&type=Parking",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], "lat must be a number");
        assert_eq!(errors[1], "lon must be at most 180");
        assert_eq!(errors[2], "radius must be at least 1");
        assert!(errors[3].as_str().unwrap().starts_with("type must be one of: "));
    }

    #[tokio::test]
    async fn test_history_requires_both_bounds() {
        let (status, body) = call(app(history_rules()), "/?from=2024-01-01").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"errors": ["to is required"]}));
    }

    #[tokio::test]
    async fn test_empty_rules_accept_anything() {
        let (status, _) = call(app(QueryRules::new()), "/?anything=goes").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_query_params_treat_blank_as_absent() {
        let params = QueryParams(HashMap::from([
            ("lat".to_string(), "  ".to_string()),
            ("lon".to_string(), "106.7".to_string()),
        ]));
        assert_eq!(params.get("lat"), None);
        assert_eq!(params.get("lon"), Some("106.7"));
        assert_eq!(params.get("radius"), None);
    }
}
