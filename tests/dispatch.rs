//! Tests for per-entity dispatch

use serde_json::json;
use tracecompress::{
    compress, CompressionConfig, CompressionError, CompressionParams, EntityGrouping, TrajDataset,
    TrajPoint, TrajRecord, COMPRESSION_PARAMS,
};

fn rec(uid: Option<&str>, tid: Option<&str>, lat: f64, lng: f64, t: i64) -> TrajRecord {
    TrajRecord::new(
        uid.map(str::to_string),
        tid.map(str::to_string),
        TrajPoint::new(lat, lng, t),
    )
}

fn params(dataset: &TrajDataset) -> CompressionParams {
    serde_json::from_value(dataset.parameter(COMPRESSION_PARAMS).unwrap().clone()).unwrap()
}

#[test]
fn test_interleaved_entities_are_not_merged() {
    // A and B stand on the same spot; their rows are interleaved in storage.
    let dataset = TrajDataset::new(vec![
        rec(Some("B"), None, 0.0, 0.0, 10),
        rec(Some("A"), None, 0.0, 0.0, 11),
        rec(Some("B"), None, 0.0, 0.0001, 12),
        rec(Some("A"), None, 3.0, 3.0, 13),
        rec(Some("B"), None, 4.0, 4.0, 14),
        rec(Some("A"), None, 3.0, 3.0001, 15),
    ]);

    let out = compress(&dataset, &CompressionConfig::default()).unwrap();

    let rows: Vec<(&str, i64)> = out
        .records
        .iter()
        .map(|r| (r.uid.as_deref().unwrap(), r.point.timestamp))
        .collect();
    assert_eq!(rows, vec![("A", 11), ("A", 13), ("B", 10), ("B", 14)]);
}

#[test]
fn test_single_entity_is_one_call() {
    let points = vec![
        rec(None, None, 0.0, 0.0, 0),
        rec(None, None, 0.0, 0.0001, 1),
        rec(None, None, 1.0, 1.0, 2),
    ];
    let out = compress(&TrajDataset::new(points), &CompressionConfig::default()).unwrap();

    assert_eq!(out.len(), 2);
    let p = params(&out);
    assert_eq!(p.grouping, EntityGrouping::default());
    assert_eq!(p.entities, 1);
}

#[test]
fn test_rows_without_user_form_their_own_entity() {
    let dataset = TrajDataset::new(vec![
        rec(Some("a"), None, 0.0, 0.0, 0),
        rec(None, None, 0.0, 0.0, 1),
        rec(Some("a"), None, 0.0, 0.0, 2),
    ]);

    let out = compress(&dataset, &CompressionConfig::default()).unwrap();

    let rows: Vec<(Option<&str>, i64)> = out
        .records
        .iter()
        .map(|r| (r.uid.as_deref(), r.point.timestamp))
        .collect();
    assert_eq!(rows, vec![(None, 1), (Some("a"), 0)]);

    let p = params(&out);
    assert!(p.grouping.by_user);
    assert_eq!(p.entities, 2);
}

#[test]
fn test_identifiers_carried_through() {
    let dataset = TrajDataset::new(vec![
        rec(Some("u1"), Some("7"), 0.0, 0.0, 0),
        rec(Some("u1"), Some("7"), 0.0, 0.0001, 1),
        rec(Some("u2"), Some("7"), 0.0, 0.0, 0),
    ]);

    let out = compress(&dataset, &CompressionConfig::default()).unwrap();

    assert_eq!(out.len(), 2);
    for record in &out.records {
        assert_eq!(record.tid.as_deref(), Some("7"));
    }
    assert_eq!(out.records[0].uid.as_deref(), Some("u1"));
    assert_eq!(out.records[1].uid.as_deref(), Some("u2"));

    let p = params(&out);
    assert!(p.grouping.by_user);
    assert!(!p.grouping.by_trajectory);
}

#[test]
fn test_extra_field_order_preserved() {
    let extra = vec![json!("speed"), json!(12.5), json!(null), json!({"k": 1})];
    let dataset = TrajDataset::new(vec![TrajRecord::new(
        Some("u".into()),
        None,
        TrajPoint::with_extra(1.0, 2.0, 3, extra.clone()),
    )]);

    let out = compress(&dataset, &CompressionConfig::default()).unwrap();

    assert_eq!(out.records[0].point.extra, extra);
}

#[test]
fn test_unsorted_input_sorted_by_default() {
    let dataset = TrajDataset::new(vec![
        rec(Some("u"), None, 1.0, 1.0, 20),
        rec(Some("u"), None, 0.0, 0.0, 10),
    ]);

    let out = compress(&dataset, &CompressionConfig::default()).unwrap();

    assert_eq!(out.records[0].point.timestamp, 10);
    assert_eq!(out.records[1].point.timestamp, 20);
}

#[test]
fn test_unsorted_input_rejected_without_sort() {
    let dataset = TrajDataset::new(vec![
        rec(Some("u"), None, 1.0, 1.0, 20),
        rec(Some("u"), None, 0.0, 0.0, 10),
    ]);
    let config = CompressionConfig {
        sort_input: false,
        ..CompressionConfig::default()
    };

    let err = compress(&dataset, &config).unwrap_err();

    match err {
        CompressionError::UnsortedInput { entity, index, .. } => {
            assert_eq!(entity.uid.as_deref(), Some("u"));
            assert_eq!(index, 1);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_malformed_point_names_entity() {
    let dataset = TrajDataset::new(vec![
        rec(Some("a"), None, 0.0, 0.0, 0),
        rec(Some("b"), None, 0.0, 0.0, 0),
        rec(Some("b"), None, f64::INFINITY, 0.0, 1),
    ]);

    let err = compress(&dataset, &CompressionConfig::default()).unwrap_err();

    assert!(err.to_string().contains("uid=b"));
}

#[test]
fn test_invalid_radius_rejected_even_for_empty_dataset() {
    let err = compress(&TrajDataset::default(), &CompressionConfig::with_radius_km(0.0));
    assert!(matches!(err, Err(CompressionError::InvalidParameter { .. })));
}

#[test]
fn test_empty_dataset() {
    let out = compress(&TrajDataset::default(), &CompressionConfig::default()).unwrap();
    assert!(out.is_empty());
    let p = params(&out);
    assert_eq!(p.entities, 0);
    assert_eq!(p.output_points, 0);
}

#[test]
fn test_existing_parameters_are_kept() {
    let mut dataset = TrajDataset::new(vec![rec(None, None, 0.0, 0.0, 0)]);
    dataset.set_parameter("filter", json!({"max_speed_kmh": 500.0}));

    let out = compress(&dataset, &CompressionConfig::with_radius_km(0.3)).unwrap();

    assert_eq!(out.parameter("filter"), Some(&json!({"max_speed_kmh": 500.0})));
    assert_eq!(params(&out).spatial_radius_km, 0.3);
    // The input dataset is untouched.
    assert!(dataset.parameter(COMPRESSION_PARAMS).is_none());
}

#[test]
fn test_compress_twice_is_stable() {
    let dataset = TrajDataset::new(
        (0..40)
            .map(|i| rec(Some("u"), None, (i / 10) as f64, 0.0, i))
            .collect(),
    );
    let config = CompressionConfig::default();

    let once = compress(&dataset, &config).unwrap();
    let twice = compress(&once, &config).unwrap();

    assert_eq!(once.records, twice.records);
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_matches_sequential() {
    use tracecompress::compress_parallel;

    let records = (0..600)
        .map(|i| {
            let uid = format!("u{}", i % 6);
            let tid = format!("{}", (i / 6) % 3);
            rec(Some(uid.as_str()), Some(tid.as_str()), (i % 11) as f64 * 0.001, 0.0, i)
        })
        .collect();
    let dataset = TrajDataset::new(records);
    let config = CompressionConfig::with_radius_km(0.5);

    let sequential = compress(&dataset, &config).unwrap();
    let parallel = compress_parallel(&dataset, &config).unwrap();

    assert_eq!(sequential, parallel);
}
