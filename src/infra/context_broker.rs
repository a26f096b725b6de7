//! NGSI-LD context broker client (Orion-LD compatible).

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use tracing::{debug, info, instrument};

use crate::domain::{
    BoundingBox, ContextBroker, DateRange, Entity, EntityCategory, EntityQuery, NearbyQuery,
    UpstreamError,
};

use super::upstream::{
    UpstreamConfig, endpoint, parse_base_url, send_expect_success, send_json, with_retries,
};

const NGSI_LD_BASE: [&str; 2] = ["ngsi-ld", "v1"];

/// HTTP client for an NGSI-LD context broker.
pub struct NgsiLdBrokerClient {
    http_client: Client,
    base_url: Url,
    config: UpstreamConfig,
}

impl NgsiLdBrokerClient {
    /// Create a new broker client with custom configuration
    pub fn new(base_url: &str, config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = parse_base_url(base_url)?;
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;
        info!(base_url = %base_url, "Created context broker client");
        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    /// Create a new broker client with default configuration
    pub fn with_defaults(base_url: &str) -> Result<Self, UpstreamError> {
        Self::new(base_url, UpstreamConfig::default())
    }

    fn ngsi_ld(&self, tail: &[&str]) -> Url {
        let segments: Vec<&str> = NGSI_LD_BASE.iter().chain(tail).copied().collect();
        endpoint(&self.base_url, &segments)
    }

    async fn get_entities(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Entity>, UpstreamError> {
        let url = self.ngsi_ld(&["entities"]);
        debug!(url = %url, ?params, "Querying entities");
        with_retries(&self.config, "query_entities", || {
            let request = self
                .http_client
                .get(url.clone())
                .header(header::ACCEPT, "application/json")
                .query(params);
            send_json(request, "entities")
        })
        .await
    }
}

/// Comma-separated NGSI-LD type list; every category when unfiltered.
fn type_param(category: Option<EntityCategory>) -> String {
    match category {
        Some(category) => category.as_str().to_string(),
        None => EntityCategory::ALL
            .iter()
            .map(EntityCategory::as_str)
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Closed GeoJSON ring around the box, in `[lon, lat]` order.
fn bbox_polygon(bbox: &BoundingBox) -> String {
    format!(
        "[[[{min_lon},{min_lat}],[{max_lon},{min_lat}],[{max_lon},{max_lat}],[{min_lon},{max_lat}],[{min_lon},{min_lat}]]]",
        min_lon = bbox.min_lon,
        min_lat = bbox.min_lat,
        max_lon = bbox.max_lon,
        max_lat = bbox.max_lat,
    )
}

fn entity_query_params(query: &EntityQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("type", type_param(query.category)),
        ("limit", query.pagination.limit.to_string()),
        ("offset", query.pagination.offset.to_string()),
    ];
    if let Some(bbox) = &query.bbox {
        params.push(("georel", "within".to_string()));
        params.push(("geometry", "Polygon".to_string()));
        params.push(("coordinates", bbox_polygon(bbox)));
    }
    params
}

fn nearby_query_params(query: &NearbyQuery) -> Vec<(&'static str, String)> {
    vec![
        ("type", type_param(query.category)),
        ("georel", format!("near;maxDistance=={}", query.radius_m)),
        ("geometry", "Point".to_string()),
        (
            "coordinates",
            format!("[{},{}]", query.center.lon, query.center.lat),
        ),
        ("limit", query.pagination.limit.to_string()),
        ("offset", query.pagination.offset.to_string()),
    ]
}

#[async_trait]
impl ContextBroker for NgsiLdBrokerClient {
    async fn health_check(&self) -> Result<(), UpstreamError> {
        let request = self.http_client.get(endpoint(&self.base_url, &["version"]));
        send_expect_success(request).await
    }

    #[instrument(skip(self))]
    async fn get_entity(&self, id: &str) -> Result<Entity, UpstreamError> {
        let url = self.ngsi_ld(&["entities", id]);
        with_retries(&self.config, "get_entity", || {
            let request = self
                .http_client
                .get(url.clone())
                .header(header::ACCEPT, "application/json");
            send_json(request, id)
        })
        .await
    }

    #[instrument(skip(self, query))]
    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, UpstreamError> {
        self.get_entities(&entity_query_params(query)).await
    }

    #[instrument(skip(self, query))]
    async fn entities_near(&self, query: &NearbyQuery) -> Result<Vec<Entity>, UpstreamError> {
        self.get_entities(&nearby_query_params(query)).await
    }

    #[instrument(skip(self, range))]
    async fn entity_history(&self, id: &str, range: &DateRange) -> Result<Entity, UpstreamError> {
        let url = self.ngsi_ld(&["temporal", "entities", id]);
        let params = [
            ("timerel", "between".to_string()),
            ("timeAt", range.start.to_rfc3339()),
            ("endTimeAt", range.end.to_rfc3339()),
        ];
        with_retries(&self.config, "entity_history", || {
            let request = self
                .http_client
                .get(url.clone())
                .header(header::ACCEPT, "application/json")
                .query(&params);
            send_json(request, id)
        })
        .await
    }
}
