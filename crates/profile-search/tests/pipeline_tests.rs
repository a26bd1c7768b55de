use profile_search::data_processing::processed::read_records_jsonl;
use profile_search::data_processing::test_data::{TestDataConfig, create_test_data};
use profile_search::data_processing::{clean_profile_file, ProfileRecord};
use profile_search::{
    AdvancedSearch, ProfileQuery, SearchBackend, SearchLimits, ServiceConfig, SimpleSearch, ingest,
};
use serde_json::json;

fn setup_test_env() {
    let _ = profile_search::init_logging(tracing::Level::WARN);
}

fn simple(q: &str, size: usize) -> ProfileQuery {
    SimpleSearch::new(Some(q), None, Some(size), &SearchLimits::default())
        .unwrap()
        .into()
}

#[tokio::test]
async fn test_clean_save_reload_ingest_search() {
    setup_test_env();
    let raw_file = create_test_data(&TestDataConfig::sample()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("profiles.jsonl");

    let cleaned = clean_profile_file(raw_file.path()).unwrap();
    cleaned.save(&output, "sample.txt").unwrap();
    let records = read_records_jsonl(&output).unwrap();
    assert_eq!(records, cleaned.records);

    let config = ServiceConfig::builder()
        .embedded(Some(dir.path().join("index")))
        .bulk_batch_size(16)
        .build()
        .unwrap();
    let backend = SearchBackend::from_config(&config.engine).unwrap();
    let report = ingest(&backend, &records, config.engine.bulk_batch_size)
        .await
        .unwrap();
    assert_eq!(report.indexed, records.len());
    assert_eq!(report.failed, 0);

    // Every record is findable by a token from its name.
    for record in records.iter().take(10) {
        let token = record.full_name.split_whitespace().last().unwrap();
        let hits = backend.search(&simple(token, 100)).await.unwrap();
        assert!(
            hits.results
                .iter()
                .any(|doc| doc["full_name"] == json!(record.full_name)),
            "{} not found by '{token}'",
            record.full_name
        );
    }
}

#[tokio::test]
async fn test_advanced_results_match_every_constraint() {
    setup_test_env();
    let raw_file = create_test_data(&TestDataConfig::sample()).unwrap();
    let records = clean_profile_file(raw_file.path()).unwrap().records;

    let config = ServiceConfig::builder().embedded(None).build().unwrap();
    let backend = SearchBackend::from_config(&config.engine).unwrap();
    ingest(&backend, &records, 500).await.unwrap();

    let body = json!({"location_country": "Japan", "skills": "Python"});
    let query: ProfileQuery =
        AdvancedSearch::from_json(body.as_object().unwrap(), Some(100), &SearchLimits::default())
            .unwrap()
            .into();
    let hits = backend.search(&query).await.unwrap();

    let expected: Vec<&ProfileRecord> = records
        .iter()
        .filter(|r| {
            r.location_country == "Japan"
                && r.keyword_values(profile_search::ProfileColumn::Skills)
                    .iter()
                    .any(|s| s == "Python")
        })
        .collect();
    assert!(!expected.is_empty(), "sample data should contain a match");
    assert_eq!(hits.total, expected.len() as u64);
    for doc in &hits.results {
        assert_eq!(doc["location_country"], json!("Japan"));
        assert!(
            doc["skills"]
                .as_array()
                .unwrap()
                .contains(&json!("Python"))
        );
    }
}

#[tokio::test]
async fn test_cleaning_twice_indexes_the_same_records() {
    setup_test_env();
    let raw_file = create_test_data(&TestDataConfig::sample()).unwrap();
    let first = clean_profile_file(raw_file.path()).unwrap();
    let second = clean_profile_file(raw_file.path()).unwrap();
    assert_eq!(first.records, second.records);

    let backend = SearchBackend::from_config(
        &ServiceConfig::builder().embedded(None).build().unwrap().engine,
    )
    .unwrap();
    ingest(&backend, &first.records, 500).await.unwrap();
    let total_first = backend.search(&simple("Engineer", 10)).await.unwrap().total;
    ingest(&backend, &second.records, 500).await.unwrap();
    let total_second = backend.search(&simple("Engineer", 10)).await.unwrap().total;
    assert_eq!(total_first, total_second);
}
