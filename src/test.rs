use crate::{
    catalog::{Catalog, CatalogStore},
    config::{ImportConfig, FILE_NAME},
    console::{run, Cli},
    importer::{update_product_stock, RowOutcome, RunReport, RunSummary, StockChange, StockImporter},
    product::{parse_product_id, Product, StockList},
    reference::{stock_exists, ReferenceRow, HL_BLOCK_TABLE_NAME},
};
use clap::Parser;
use serde_json::json;
use std::{fs, path::Path};
use tempfile::TempDir;

const CATALOG_ID: u64 = 2;
const STOCK_DIR: &str = "/upload/import/";

fn sample_store() -> CatalogStore {
    let mut store = CatalogStore::default();
    store.add_iblock(1, "news", "content");
    store.add_iblock(CATALOG_ID, "catalog", "catalog");
    store.add_product(Product::new(101, CATALOG_ID, "Kettle").with_stock(["WH-1"]));
    store.add_product(Product::new(102, CATALOG_ID, "Toaster"));
    store.add_product(Product::new(103, 1, "Press release"));
    store.add_reference_row(HL_BLOCK_TABLE_NAME, ReferenceRow::new("WH-1"));
    store.add_reference_row(
        HL_BLOCK_TABLE_NAME,
        ReferenceRow::new("WH-5").with_field("UF_NAME", json!("North")),
    );
    store
}

fn site_with_file(contents: Option<&str>) -> (TempDir, ImportConfig) {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("upload/import");
    fs::create_dir_all(&dir).unwrap();
    if let Some(contents) = contents {
        fs::write(dir.join(FILE_NAME), contents).unwrap();
    }
    let config = ImportConfig::new(root.path(), STOCK_DIR);
    (root, config)
}

fn stock(store: &CatalogStore, product_id: u64) -> Vec<String> {
    store.stock_values(CATALOG_ID, product_id).to_vec()
}

fn completed(report: RunReport) -> RunSummary {
    match report {
        RunReport::Completed(summary) => summary,
        RunReport::FileMissing(path) => panic!("file unexpectedly missing: {}", path.display()),
    }
}

#[test]
fn assigns_warehouse_to_listed_products() {
    let (_root, config) = site_with_file(Some("101;Kettle;1\n102;Toaster;4\n"));
    let mut store = sample_store();
    let summary = match StockImporter::new(&config, &mut store).run("WH-5") {
        Ok(report) => completed(report),
        Err(e) => panic!("{}", e),
    };

    assert_eq!(stock(&store, 101), vec!["WH-1", "WH-5"]);
    assert_eq!(stock(&store, 102), vec!["WH-5"]);
    assert_eq!(summary.updated(), 2);
    assert_eq!(summary.failed(), 0);
}

#[test]
fn listed_warehouse_is_not_duplicated() {
    let (_root, config) = site_with_file(Some("101\n"));
    let mut store = sample_store();
    let summary = completed(StockImporter::new(&config, &mut store).run("WH-1").unwrap());

    assert_eq!(stock(&store, 101), vec!["WH-1"]);
    assert_eq!(summary.unchanged(), 1);
    assert!(!summary.has_changes());
}

#[test]
fn second_import_changes_nothing() {
    let (_root, config) = site_with_file(Some("101;a\n102;b\n101;again\n"));
    let mut store = sample_store();
    let first = completed(StockImporter::new(&config, &mut store).run("WH-5").unwrap());
    let after_first = (stock(&store, 101), stock(&store, 102));

    let second = completed(StockImporter::new(&config, &mut store).run("WH-5").unwrap());

    assert_eq!((stock(&store, 101), stock(&store, 102)), after_first);
    assert_eq!(first.updated(), 2);
    assert_eq!(first.unchanged(), 1);
    assert_eq!(second.updated(), 0);
    assert_eq!(second.unchanged(), 3);
}

#[test]
fn missing_file_is_a_notice() {
    let (_root, config) = site_with_file(None);
    let mut store = sample_store();
    match StockImporter::new(&config, &mut store).run("WH-5") {
        Ok(RunReport::FileMissing(path)) => assert!(path.ends_with(FILE_NAME)),
        Ok(other) => panic!("unexpected report {:?}", other),
        Err(e) => panic!("{}", e),
    }
    assert_eq!(stock(&store, 101), vec!["WH-1"]);
    assert!(stock(&store, 102).is_empty());
}

#[test]
fn missing_file_wins_over_unknown_warehouse() {
    let (_root, config) = site_with_file(None);
    let mut store = sample_store();
    let report = StockImporter::new(&config, &mut store).run("WH-404");
    assert!(matches!(report, Ok(RunReport::FileMissing(_))));
}

#[test]
fn unknown_warehouse_aborts_the_run() {
    let (_root, config) = site_with_file(Some("101\n102\n"));
    let mut store = sample_store();
    match StockImporter::new(&config, &mut store).run("WH-404") {
        Ok(report) => panic!("expected failure, got {:?}", report),
        Err(e) => assert!(e.to_string().contains("Warehouse not found: WH-404")),
    }
    assert_eq!(stock(&store, 101), vec!["WH-1"]);
    assert!(stock(&store, 102).is_empty());
}

#[test]
fn missing_reference_table_is_fatal() {
    let (_root, config) = site_with_file(Some("101\n"));
    let mut store = sample_store();
    store.reference_tables.clear();
    let error = StockImporter::new(&config, &mut store).run("WH-5").unwrap_err();
    assert!(error.to_string().contains("Highload block not found"));
}

#[test]
fn missing_catalog_iblock_is_fatal() {
    let (_root, config) = site_with_file(Some("101\n"));
    let mut store = sample_store();
    store.iblocks.retain(|iblock| iblock.code != "catalog");
    let error = StockImporter::new(&config, &mut store).run("WH-5").unwrap_err();
    assert!(error.to_string().contains("Catalog iblock not found"));
    assert_eq!(stock(&store, 101), vec!["WH-1"]);
}

#[test]
fn unknown_product_is_skipped_and_run_continues() {
    let (_root, config) = site_with_file(Some("999;ghost\n102;Toaster\n"));
    let mut store = sample_store();
    let summary = completed(StockImporter::new(&config, &mut store).run("WH-5").unwrap());

    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.updated(), 1);
    assert_eq!(summary.rows[0].product_id, Some(999));
    assert!(matches!(summary.rows[0].outcome, RowOutcome::Skipped(_)));
    assert_eq!(stock(&store, 102), vec!["WH-5"]);
}

#[test]
fn product_of_another_iblock_is_skipped() {
    let (_root, config) = site_with_file(Some("103\n"));
    let mut store = sample_store();
    let summary = completed(StockImporter::new(&config, &mut store).run("WH-5").unwrap());

    assert_eq!(summary.skipped(), 1);
    assert!(store.stock_values(1, 103).is_empty());
}

#[test]
fn bad_rows_fail_without_stopping_the_run() {
    let (_root, config) = site_with_file(Some("abc;x\n;empty id\n\u{feff}101\n 102 ;padded\n"));
    let mut store = sample_store();
    let summary = completed(StockImporter::new(&config, &mut store).run("WH-5").unwrap());

    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.updated(), 2);
    assert_eq!(summary.rows[0].line, 1);
    assert_eq!(summary.rows[2].product_id, Some(101));
    assert_eq!(stock(&store, 102), vec!["WH-5"]);
}

#[test]
fn invalid_utf8_row_is_reported() {
    let mut store = sample_store();
    let config = ImportConfig::default();
    let mut summary = RunSummary::new("WH-5", FILE_NAME.into());
    let data: &[u8] = b"\xff\xfe;1\n102\n";
    StockImporter::new(&config, &mut store)
        .import_rows(data, CATALOG_ID, "WH-5", &mut summary)
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.updated(), 1);
}

#[test]
fn update_reads_then_writes_whole_list() {
    let mut store = sample_store();
    match update_product_stock(&mut store, CATALOG_ID, 101, "WH-7") {
        Ok(change) => assert_eq!(change, StockChange::Added),
        Err(e) => panic!("{}", e),
    }
    let change = update_product_stock(&mut store, CATALOG_ID, 101, "WH-7").unwrap();
    assert_eq!(change, StockChange::AlreadyPresent);
    assert_eq!(stock(&store, 101), vec!["WH-1", "WH-7"]);
}

#[test]
fn update_of_unknown_product_fails() {
    let mut store = sample_store();
    let error = update_product_stock(&mut store, CATALOG_ID, 555, "WH-5").unwrap_err();
    assert!(error.to_string().contains("Product not found"));
}

#[test]
fn reference_lookup() {
    let store = sample_store();
    assert!(stock_exists(&store, "WH-5").unwrap());
    assert!(!stock_exists(&store, "wh-5").unwrap());
    assert!(stock_exists(&CatalogStore::default(), "WH-5").is_err());
}

#[test]
fn stock_dir_is_relative_to_document_root() {
    let (root, config) = site_with_file(None);
    let dir = config.stock_dir().unwrap();
    assert_eq!(dir, root.path().join("upload/import"));
    assert_eq!(config.stock_file().unwrap(), dir.join(FILE_NAME));
}

#[test]
fn configuration_errors_are_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut store = sample_store();

    let unset = ImportConfig {
        document_root: Some(root.path().to_path_buf()),
        import: None,
    };
    let error = StockImporter::new(&unset, &mut store).run("WH-5").unwrap_err();
    assert!(error.to_string().contains("Import configuration is not set"));

    let empty = ImportConfig::new(root.path(), "");
    assert!(empty.stock_dir().is_err());

    let absent = ImportConfig::new(root.path(), "/no/such/dir/");
    let error = absent.stock_file().unwrap_err();
    assert!(error.to_string().contains("does not exist on the server"));

    let no_root = ImportConfig::default().with_document_root(None);
    assert!(no_root.stock_dir().is_err());
}

#[test]
fn config_file_is_read_from_json() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("import.json");
    fs::write(
        &path,
        r#"{ "document_root": "/var/www", "import": { "dir": { "stock": "/upload/stock/" } } }"#,
    )
    .unwrap();

    let config = ImportConfig::load(&path)
        .unwrap()
        .with_document_root(Some(root.path().to_path_buf()));
    assert_eq!(config.stock_dir_key(), Some("/upload/stock/"));
    assert_eq!(config.document_root.as_deref(), Some(root.path()));
    assert!(ImportConfig::load(&root.path().join("missing.json")).is_err());
}

#[test]
fn duplicate_codes_collapse_on_load() {
    let product: Product = serde_json::from_value(json!({
        "id": 7,
        "iblock_id": 2,
        "STOCK": ["WH-2", "WH-1", "WH-2"],
        "properties": { "COLOR": "red" }
    }))
    .unwrap();

    assert_eq!(product.stock, StockList::from_iter(["WH-1", "WH-2"]));
    assert_eq!(product.property("COLOR"), Some(&json!("red")));
}

#[test]
fn catalog_snapshot_round_trip_keeps_other_properties() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("catalog.json");
    let mut store = sample_store();
    let mut product = Product::new(104, CATALOG_ID, "Mixer").with_stock(["WH-1"]);
    product.set_property("ARTICLE", json!("MX-1"));
    store.add_product(product);
    store.save_as(&path).unwrap();

    let mut loaded = CatalogStore::load(&path).unwrap();
    update_product_stock(&mut loaded, CATALOG_ID, 104, "WH-5").unwrap();
    loaded.save().unwrap();

    let reloaded = CatalogStore::load(&path).unwrap();
    let mixer = reloaded.product(CATALOG_ID, 104).unwrap();
    assert_eq!(mixer.stock.to_vec(), vec!["WH-1", "WH-5"]);
    assert_eq!(mixer.property("ARTICLE"), Some(&json!("MX-1")));
    assert_eq!(reloaded.reference_tables[HL_BLOCK_TABLE_NAME].len(), 2);
}

#[test]
fn product_id_parsing() {
    assert_eq!(parse_product_id("42").unwrap(), 42);
    assert_eq!(parse_product_id(" 42\t").unwrap(), 42);
    assert_eq!(parse_product_id("\u{feff}42").unwrap(), 42);
    assert!(parse_product_id("").is_err());
    assert!(parse_product_id("-1").is_err());
    assert!(parse_product_id("12abc").is_err());
}

fn write_site(root: &Path, csv: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let dir = root.join("upload/import");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(FILE_NAME), csv).unwrap();

    let config_path = root.join("import.json");
    fs::write(
        &config_path,
        json!({ "import": { "dir": { "stock": STOCK_DIR } } }).to_string(),
    )
    .unwrap();

    let catalog_path = root.join("catalog.json");
    sample_store().save_as(&catalog_path).unwrap();
    (config_path, catalog_path)
}

#[test]
fn command_line_run_saves_catalog() {
    let root = tempfile::tempdir().unwrap();
    let (config_path, catalog_path) = write_site(root.path(), "101;x\n102;y\n");
    let cli = Cli::try_parse_from([
        "import_items_stock",
        "WH-5",
        "--config",
        config_path.to_str().unwrap(),
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--document-root",
        root.path().to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(cli.xml_id, "WH-5");

    match run(cli) {
        Ok(_) => {}
        Err(e) => panic!("{}", e),
    }
    let store = CatalogStore::load(&catalog_path).unwrap();
    assert_eq!(stock(&store, 101), vec!["WH-1", "WH-5"]);
    assert_eq!(stock(&store, 102), vec!["WH-5"]);
}

#[test]
fn command_line_requires_warehouse() {
    assert!(Cli::try_parse_from(["import_items_stock"]).is_err());
    let cli = Cli::try_parse_from(["import_items_stock", "WH-1"]).unwrap();
    assert_eq!(cli.config, Path::new("./import.json"));
    assert!(cli.document_root.is_none());
}
