use tempfile::TempDir;
use trawl_changes::{ChangeDetector, SnapshotStore};
use trawl_core::{AppConfig, Category, Image, JobId, Product, Record, ScrapeResult};

fn product(title: &str, price: &str) -> Product {
    Product {
        title: title.to_string(),
        price: Some(price.to_string()),
        price_value: price.trim_start_matches("USD").parse().ok(),
        price_currency: Some("USD".to_string()),
        link: Some(format!("https://shop.example.com/p/{title}")),
        ..Product::default()
    }
}

fn run_data(products: Vec<Product>) -> ScrapeResult {
    ScrapeResult {
        products: Some(products),
        images: Some(vec![Image {
            url: "https://shop.example.com/logo.png".to_string(),
            width: Some(120),
            ..Image::default()
        }]),
        ..ScrapeResult::default()
    }
}

#[test]
fn test_two_runs_against_the_store() {
    let dir = TempDir::new().unwrap();
    let detector = ChangeDetector::new(
        SnapshotStore::new(dir.path()),
        AppConfig::default().changes.key_fields,
    );
    let job = JobId::new("acme").unwrap();

    let first = detector
        .record_run(
            &job,
            &run_data(vec![product("a", "USD1.99"), product("b", "USD2.49")]),
            &[],
        )
        .unwrap();
    assert_eq!(first.run, 1);
    assert_eq!(first.changes.new_count(), 3);

    let second = detector
        .record_run(
            &job,
            &run_data(vec![product("a", "USD1.79"), product("c", "USD5.00")]),
            &[],
        )
        .unwrap();
    assert_eq!(second.run, 2);

    let changes = &second.changes;
    assert_eq!(
        changes.new[&Category::Products],
        vec![Record::Product(product("c", "USD5.00"))]
    );
    assert_eq!(changes.updated[&Category::Products].len(), 1);
    assert_eq!(changes.removed[&Category::Products].len(), 1);
    assert!(changes.new[&Category::Images].is_empty());
    assert!(changes.updated[&Category::Images].is_empty());
}

#[test]
fn test_repeated_identical_runs_report_no_changes() {
    let dir = TempDir::new().unwrap();
    let detector = ChangeDetector::new(
        SnapshotStore::new(dir.path()),
        AppConfig::default().changes.key_fields,
    );
    let job = JobId::new("acme").unwrap();
    let data = run_data(vec![product("a", "USD19.99")]);

    detector.record_run(&job, &data, &[]).unwrap();
    let again = detector.record_run(&job, &data, &[]).unwrap();

    assert!(again.changes.is_empty());
    assert_eq!(detector.store().runs(&job).unwrap().len(), 2);
}

#[test]
fn test_jobs_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let detector = ChangeDetector::new(store, AppConfig::default().changes.key_fields);

    let data = run_data(vec![product("a", "USD1.00")]);
    detector
        .record_run(&JobId::new("one").unwrap(), &data, &[])
        .unwrap();
    let other = detector
        .record_run(&JobId::new("two").unwrap(), &data, &[])
        .unwrap();

    assert_eq!(other.run, 1);
    assert!(!other.changes.is_empty());
}

#[test]
fn test_unreadable_category_keeps_its_baseline() {
    let dir = TempDir::new().unwrap();
    let detector = ChangeDetector::new(
        SnapshotStore::new(dir.path()),
        AppConfig::default().changes.key_fields,
    );
    let job = JobId::new("acme").unwrap();
    let healthy = run_data(vec![product("a", "USD1.00"), product("b", "USD2.00")]);

    detector.record_run(&job, &healthy, &[]).unwrap();

    let mut broken = healthy.clone();
    broken.products = Some(Vec::new());
    let failed = detector
        .record_run(&job, &broken, &[Category::Products])
        .unwrap();
    assert_eq!(failed.changes.removed_count(), 0);
    assert!(!failed.changes.removed.contains_key(&Category::Products));

    let saved = SnapshotStore::load(&failed.snapshot_path).unwrap();
    assert_eq!(saved.data.products, healthy.products);
    assert_eq!(saved.record_ids[&Category::Products].len(), 2);

    let recovered = detector.record_run(&job, &healthy, &[]).unwrap();
    assert!(recovered.changes.is_empty());
}
