use crate::{
    catalog::{catalog_iblock_id, Catalog},
    config::ImportConfig,
    product::{parse_product_id, ErrorMessage::ProductNotFound, PROP_NAME},
    reference::{stock_exists, ReferenceError, ReferenceLookup},
};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use log::{debug, info, warn};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    fs::File,
    io::Read,
    path::PathBuf,
};
use RowOutcome::*;

/// One line of the stock file. Only the first field is used.
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub line: u64,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StockChange {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RowOutcome {
    Updated,
    Unchanged,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RowReport {
    pub line: u64,
    pub product_id: Option<u64>,
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub xml_id: String,
    pub file_path: PathBuf,
    pub rows: Vec<RowReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum RunReport {
    /// The stock file is not there; nothing was touched.
    FileMissing(PathBuf),
    Completed(RunSummary),
}

impl ImportRow {
    pub fn from_record(record: &StringRecord) -> Self {
        ImportRow {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            fields: record.iter().map(str::to_string).collect(),
        }
    }

    pub fn product_id(&self) -> Result<u64, Box<dyn Error>> {
        parse_product_id(self.fields.first().map(String::as_str).unwrap_or_default())
    }
}

impl Display for RowOutcome {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Updated => write!(f, "updated"),
            Unchanged => write!(f, "unchanged"),
            Skipped(reason) => write!(f, "skipped: {}", reason),
            Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl RunSummary {
    pub fn new(xml_id: &str, file_path: PathBuf) -> Self {
        let now = Utc::now();
        RunSummary {
            xml_id: xml_id.to_string(),
            file_path,
            rows: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn count(&self, predicate: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|row| predicate(&row.outcome)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|outcome| *outcome == Updated)
    }

    pub fn unchanged(&self) -> usize {
        self.count(|outcome| *outcome == Unchanged)
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Failed(_)))
    }

    pub fn has_changes(&self) -> bool {
        self.updated() > 0
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        write!(
            f,
            "Warehouse {}: {} rows, {} updated, {} unchanged, {} skipped, {} failed in {} ms",
            self.xml_id,
            self.rows.len(),
            self.updated(),
            self.unchanged(),
            self.skipped(),
            self.failed(),
            elapsed.num_milliseconds()
        )
    }
}

/// Adds `xml_id` to the stock property of a product unless it is already
/// listed. The whole list is written back.
pub fn update_product_stock<C: Catalog + ?Sized>(
    catalog: &mut C,
    iblock_id: u64,
    product_id: u64,
    xml_id: &str,
) -> Result<StockChange, Box<dyn Error>> {
    let mut stock = catalog.stock_values(iblock_id, product_id);
    if !stock.insert(xml_id) {
        return Ok(StockChange::AlreadyPresent);
    }
    catalog.set_stock_values(iblock_id, product_id, stock)?;
    Ok(StockChange::Added)
}

/// Runs one stock import against a catalog backend.
pub struct StockImporter<'a, S: ?Sized> {
    config: &'a ImportConfig,
    store: &'a mut S,
}

impl<'a, S> StockImporter<'a, S>
where
    S: Catalog + ReferenceLookup + ?Sized,
{
    pub fn new(config: &'a ImportConfig, store: &'a mut S) -> Self {
        StockImporter { config, store }
    }

    pub fn run(&mut self, xml_id: &str) -> Result<RunReport, Box<dyn Error>> {
        let file_path = self.config.stock_file()?;
        if !file_path.exists() {
            info!("File not found: {}", file_path.display());
            return Ok(RunReport::FileMissing(file_path));
        }
        if !stock_exists(&*self.store, xml_id)? {
            return Err(ReferenceError::warehouse_missing(xml_id));
        }
        let iblock_id = catalog_iblock_id(&*self.store)?;

        let file = File::open(&file_path)?;
        let mut summary = RunSummary::new(xml_id, file_path);
        self.import_rows(file, iblock_id, xml_id, &mut summary)?;
        summary.finished_at = Utc::now();
        Ok(RunReport::Completed(summary))
    }

    /// Applies every record of `reader` to the catalog. Only an I/O failure
    /// of the reader stops the scan.
    pub fn import_rows<R: Read>(
        &mut self,
        reader: R,
        iblock_id: u64,
        xml_id: &str,
        summary: &mut RunSummary,
    ) -> Result<(), Box<dyn Error>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        for (index, result) in csv_reader.records().enumerate() {
            let report = match result {
                Ok(record) => self.import_row(&ImportRow::from_record(&record), iblock_id, xml_id),
                Err(e) if e.is_io_error() => return Err(Box::new(e)),
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
                    warn!("Line {}: {}", line, e);
                    RowReport {
                        line,
                        product_id: None,
                        outcome: Failed(e.to_string()),
                    }
                }
            };
            debug!("Line {}: {}", report.line, report.outcome);
            summary.rows.push(report);
        }
        Ok(())
    }

    fn import_row(&mut self, row: &ImportRow, iblock_id: u64, xml_id: &str) -> RowReport {
        let product_id = match row.product_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("Line {}: {}", row.line, e);
                return RowReport {
                    line: row.line,
                    product_id: None,
                    outcome: Failed(e.to_string()),
                };
            }
        };

        let outcome = if !self.store.product_exists(iblock_id, product_id) {
            let message = ProductNotFound.with_id(product_id);
            warn!("Line {}: {}", row.line, message);
            Skipped(message)
        } else {
            match update_product_stock(&mut *self.store, iblock_id, product_id, xml_id) {
                Ok(StockChange::Added) => {
                    debug!("{} of product {} now lists {}", PROP_NAME, product_id, xml_id);
                    Updated
                }
                Ok(StockChange::AlreadyPresent) => Unchanged,
                Err(e) => {
                    warn!("Line {}: {}", row.line, e);
                    Failed(e.to_string())
                }
            }
        };

        RowReport {
            line: row.line,
            product_id: Some(product_id),
            outcome,
        }
    }
}
