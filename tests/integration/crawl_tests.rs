//! Integration tests for the scraper
//!
//! These tests use wiremock to stand up mock WooCommerce stores and run the
//! full scrape cycle end-to-end: discovery, extraction, reconciliation and
//! CSV export.

use pricewatch::config::{
    Config, CrawlerConfig, OutputConfig, ScheduleConfig, StoreConfig, StoreRegistry, StoreType,
};
use pricewatch::crawler::{Coordinator, RunSummary};
use pricewatch::storage::{open_storage, SqliteStorage, StockStatus, Storage};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/wp-json/wc/store/products";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Creates a single-store configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path, discover_api: bool) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_categories: 2,
            request_timeout: 5,
            discovery_timeout: 2,
            max_retries: 1,
            retry_delay: 1,
            max_pages: 10,
            ..CrawlerConfig::default()
        },
        output: OutputConfig {
            database_path: dir.join("prices.db").display().to_string(),
            export_dir: dir.join("CSVs").display().to_string(),
        },
        schedule: ScheduleConfig::default(),
        stores: vec![StoreConfig {
            name: "Mock Store".to_string(),
            base_url: base_url.to_string(),
            store_type: StoreType::Tech,
            categories: vec!["cpu".to_string()],
            tax_included: false,
            tax_rate: dec("0.11"),
            discover_api,
            currency: "USD".to_string(),
            tax_exempt_phrases: vec![],
        }],
    }
}

async fn run_once(config: &Config) -> RunSummary {
    let registry = StoreRegistry::from_config(config);
    let coordinator = Coordinator::new(config.clone(), registry, "test-hash")
        .expect("Failed to create coordinator");
    coordinator.run().await.expect("Run failed")
}

fn open_db(config: &Config) -> SqliteStorage {
    open_storage(Path::new(&config.output.database_path)).expect("Failed to open database")
}

fn api_body(items: &[(u32, &str, &str)]) -> String {
    let products: Vec<String> = items
        .iter()
        .map(|(id, name, price)| {
            format!(
                r#"{{"id": {id}, "name": "{name}", "permalink": "https://shop.test/p/{id}",
                    "prices": {{"price": "{price}", "currency_minor_unit": 2}},
                    "is_in_stock": true}}"#
            )
        })
        .collect();
    format!("[{}]", products.join(","))
}

async fn mount_api_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("category", "cpu"))
        .and(query_param("page", page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/json"),
        )
        .mount(server)
        .await;
}

fn grid_page(items: &[(u32, &str, &str)]) -> String {
    let products: String = items
        .iter()
        .map(|(id, name, price)| {
            format!(
                r#"<li class="product post-{id} instock">
                     <a href="/product/{id}/" class="woocommerce-LoopProduct-link">
                       <h2 class="woocommerce-loop-product__title">{name}</h2>
                       <span class="price">${price}</span>
                     </a>
                     <a href="?add-to-cart={id}" data-product_id="{id}" data-product_sku="SKU{id}">Add</a>
                   </li>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><ul class="products">{}</ul></body></html>"#,
        products
    )
}

async fn mount_html_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_store_full_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    mount_api_page(
        &mock_server,
        "1",
        api_body(&[(1, "Ryzen 5 7600", "19900"), (2, "Core i5 14400", "21500")]),
    )
    .await;
    mount_api_page(&mock_server, "2", "[]".to_string()).await;

    let summary = run_once(&config).await;

    assert_eq!(summary.strategies, vec![("Mock Store".to_string(), "api")]);
    assert_eq!(summary.stats.total_fetched, 2);
    assert_eq!(summary.stats.db_created, 2);
    assert_eq!(summary.stats.categories_failed, 0);

    let storage = open_db(&config);
    let products = storage.list_products().unwrap();
    assert_eq!(products.len(), 2);

    let ryzen = products.iter().find(|p| p.source_id == "1").unwrap();
    assert_eq!(ryzen.price, dec("199.00"));
    assert_eq!(ryzen.price_before_tax, dec("199.00"));
    assert_eq!(ryzen.price_after_tax, dec("220.89"));
    assert_eq!(ryzen.category, "cpu");
    assert_eq!(ryzen.stock_status, StockStatus::InStock);

    let export = summary.export.expect("CSV export should succeed");
    assert_eq!(export.rows, 2);
    assert!(export.snapshot.exists());
    assert!(dir.path().join("CSVs").join("products_latest.csv").exists());
}

#[tokio::test]
async fn test_discovery_disabled_uses_html_even_with_api() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), false);

    // A reachable API that must never be called
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(api_body(&[(
            9,
            "From API",
            "100",
        )])))
        .expect(0)
        .mount(&mock_server)
        .await;

    mount_html_page(
        &mock_server,
        "/product-category/cpu/",
        grid_page(&[(11, "Grid CPU", "150.00")]),
    )
    .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.strategies, vec![("Mock Store".to_string(), "html")]);

    let storage = open_db(&config);
    let products = storage.list_products().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Grid CPU");
    assert_eq!(products[0].source_id, "11");
    assert_eq!(products[0].sku.as_deref(), Some("SKU11"));
    assert_eq!(products[0].price_after_tax, dec("166.50"));
}

#[tokio::test]
async fn test_discovery_falls_back_to_html() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    // No API mocked: every probe gets a 404
    mount_html_page(
        &mock_server,
        "/product-category/cpu/",
        grid_page(&[(1, "CPU One", "10"), (2, "CPU Two", "20")]),
    )
    .await;
    mount_html_page(
        &mock_server,
        "/product-category/cpu/page/2/",
        grid_page(&[(3, "CPU Three", "30")]),
    )
    .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.strategies, vec![("Mock Store".to_string(), "html")]);
    assert_eq!(summary.stats.db_created, 3);
    assert_eq!(summary.stats.pages_fetched, 2);
    assert_eq!(open_db(&config).count_products().unwrap(), 3);
}

#[tokio::test]
async fn test_unchanged_rerun_adds_no_history() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    mount_api_page(
        &mock_server,
        "1",
        api_body(&[(1, "Ryzen 5 7600", "19900"), (2, "Core i5 14400", "21500")]),
    )
    .await;
    mount_api_page(&mock_server, "2", "[]".to_string()).await;

    run_once(&config).await;
    let second = run_once(&config).await;

    assert_eq!(second.stats.db_created, 0);
    assert_eq!(second.stats.db_updated, 0);
    assert_eq!(second.stats.db_unchanged, 2);

    let storage = open_db(&config);
    assert_eq!(storage.count_products().unwrap(), 2);
    assert_eq!(storage.count_price_history().unwrap(), 0);
}

#[tokio::test]
async fn test_price_change_adds_one_history_entry() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    mount_api_page(&mock_server, "1", api_body(&[(1, "Ryzen 5 7600", "10000")])).await;
    mount_api_page(&mock_server, "2", "[]".to_string()).await;
    run_once(&config).await;

    mock_server.reset().await;
    mount_api_page(&mock_server, "1", api_body(&[(1, "Ryzen 5 7600", "9000")])).await;
    mount_api_page(&mock_server, "2", "[]".to_string()).await;
    let summary = run_once(&config).await;

    assert_eq!(summary.stats.db_updated, 1);

    let storage = open_db(&config);
    let product = &storage.list_products().unwrap()[0];
    assert_eq!(product.price, dec("90.00"));
    assert_eq!(product.price_after_tax, dec("99.90"));

    let history = storage.get_price_history(product.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price_after_tax, dec("99.90"));
}

#[tokio::test]
async fn test_unpriced_and_malformed_items_are_skipped() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    let body = r#"[
        {"id": 1, "name": "Priced", "price": "10"},
        {"id": 2, "name": "Call for price"},
        {"id": 3}
    ]"#;
    mount_api_page(&mock_server, "1", body.to_string()).await;

    let summary = run_once(&config).await;

    assert_eq!(summary.stats.db_created, 1);
    assert_eq!(summary.stats.products_skipped, 2);
    assert_eq!(open_db(&config).count_products().unwrap(), 1);
}

#[tokio::test]
async fn test_missing_category_is_counted_not_fatal() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path(), false);
    config.stores[0].categories = vec!["cpu".to_string(), "gone".to_string()];

    mount_html_page(
        &mock_server,
        "/product-category/cpu/",
        grid_page(&[(1, "CPU One", "10")]),
    )
    .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.stats.categories_failed, 1);
    assert_eq!(summary.stats.db_created, 1);
    assert!(summary.export.is_some());
}

#[tokio::test]
async fn test_tax_included_store_with_exempt_product() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), dir.path(), true);
    config.stores[0].tax_included = true;
    config.stores[0].tax_exempt_phrases = vec!["gift card".to_string()];

    mount_api_page(
        &mock_server,
        "1",
        api_body(&[(1, "Gaming Monitor", "11100"), (2, "Steam Gift Card", "5000")]),
    )
    .await;
    mount_api_page(&mock_server, "2", "[]".to_string()).await;

    run_once(&config).await;

    let products = open_db(&config).list_products().unwrap();
    assert_eq!(products.len(), 2);

    let monitor = products.iter().find(|p| p.source_id == "1").unwrap();
    assert_eq!(monitor.price, dec("111.00"));
    assert_eq!(monitor.price_before_tax, dec("100.00"));
    assert_eq!(monitor.price_after_tax, dec("111.00"));

    let card = products.iter().find(|p| p.source_id == "2").unwrap();
    assert_eq!(card.price_before_tax, dec("50.00"));
    assert_eq!(card.price_after_tax, dec("50.00"));
}

#[tokio::test]
async fn test_repeated_page_stops_pagination() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), false);

    // Every page number serves the first page again
    Mock::given(method("GET"))
        .and(path_regex(r"^/product-category/cpu/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(grid_page(&[(1, "CPU One", "10"), (2, "CPU Two", "20")])),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.stats.pages_fetched, 2);
    assert_eq!(summary.stats.db_created, 2);
    assert_eq!(summary.stats.db_unchanged, 0);
    assert_eq!(summary.stats.categories_failed, 0);
}

#[tokio::test]
async fn test_redirected_page_stops_pagination() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), false);

    mount_html_page(
        &mock_server,
        "/product-category/cpu/",
        grid_page(&[(1, "CPU One", "10")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/product-category/cpu/page/2/"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/product-category/cpu/", mock_server.uri())),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.stats.pages_fetched, 1);
    assert_eq!(summary.stats.db_created, 1);
    assert_eq!(summary.stats.db_unchanged, 0);
    assert_eq!(summary.stats.pages_failed, 0);
}

#[tokio::test]
async fn test_discovery_skips_non_array_endpoint() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), dir.path(), true);

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Hit once by discovery, then read as the first listing page
    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/products"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"id": 40, "name": "PSU 750W", "price": "89.99"}]"#),
        )
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wc/v3/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let summary = run_once(&config).await;

    assert_eq!(summary.strategies, vec![("Mock Store".to_string(), "api")]);
    assert_eq!(summary.stats.db_created, 1);

    let product = &open_db(&config).list_products().unwrap()[0];
    assert_eq!(product.source_id, "40");
    assert_eq!(product.price, dec("89.99"));
}
