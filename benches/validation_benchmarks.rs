use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use urban_intelligence_api::domain::{
    AgentRequest, FieldRule, QueryRules, is_valid_entity_id, validate_agent_request,
    validate_bbox, validate_coordinates, validate_date_range, validate_pagination,
};

fn bench_validators(c: &mut Criterion) {
    c.bench_function("validate_coordinates", |b| {
        b.iter(|| validate_coordinates(black_box("10.7769"), black_box("106.7009")))
    });

    c.bench_function("is_valid_entity_id", |b| {
        b.iter(|| is_valid_entity_id(black_box("urn:ngsi-ld:TrafficFlowObserved:hcm-district-1")))
    });

    c.bench_function("validate_pagination", |b| {
        b.iter(|| validate_pagination(black_box(Some("250")), black_box(Some("40"))))
    });

    c.bench_function("validate_date_range", |b| {
        b.iter(|| {
            validate_date_range(
                black_box("2024-03-01T00:00:00Z"),
                black_box("2024-04-15T12:30:00Z"),
            )
        })
    });

    c.bench_function("validate_bbox", |b| {
        b.iter(|| validate_bbox(black_box("10.70,106.60,10.85,106.80")))
    });

    let request = AgentRequest::new("Summarize congestion around Ben Thanh market this morning");
    c.bench_function("validate_agent_request", |b| {
        b.iter(|| validate_agent_request(black_box(&request)))
    });
}

fn bench_query_rules(c: &mut Criterion) {
    let rules = QueryRules::new()
        .field("lat", FieldRule::number().required().range(-90.0, 90.0))
        .field("lon", FieldRule::number().required().range(-180.0, 180.0))
        .field("radius", FieldRule::number().range(1.0, 50_000.0))
        .field(
            "type",
            FieldRule::string().one_of(["TrafficFlowObserved", "WeatherObserved"]),
        );

    let valid: HashMap<String, String> = [
        ("lat", "10.7769"),
        ("lon", "106.7009"),
        ("radius", "500"),
        ("type", "WeatherObserved"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let empty = HashMap::new();

    c.bench_function("query_rules_valid", |b| {
        b.iter(|| rules.check(black_box(&valid)))
    });
    c.bench_function("query_rules_all_missing", |b| {
        b.iter(|| rules.check(black_box(&empty)))
    });
}

criterion_group!(benches, bench_validators, bench_query_rules);
criterion_main!(benches);
