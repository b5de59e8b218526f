use {
    crate::{
        catalog::CatalogStore,
        config::ImportConfig,
        importer::{RunReport, StockImporter},
    },
    clap::Parser,
    log::{info, Level, LevelFilter, Metadata, Record, SetLoggerError},
    std::{error::Error, path::PathBuf},
};

pub const NAME: &str = "import_items_stock";

/// Assign a warehouse to the products listed in the stock CSV file.
#[derive(Parser, Debug)]
#[command(name = NAME, version)]
pub struct Cli {
    /// xml_id of the warehouse
    pub xml_id: String,
    /// Site configuration providing import.dir.stock
    #[arg(long, short, default_value = "./import.json")]
    pub config: PathBuf,
    /// Catalog snapshot to update
    #[arg(long, default_value = "./catalog.json")]
    pub catalog: PathBuf,
    /// Overrides document_root from the configuration
    #[arg(long)]
    pub document_root: Option<PathBuf>,
    /// Print a record for every processed row
    #[arg(long, short)]
    pub verbose: bool,
}

struct ImportLogger;

impl log::Log for ImportLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error | Level::Warn => eprintln!("{} - {}", record.level(), record.args()),
            _ => println!("{} - {}", record.level(), record.args()),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ImportLogger = ImportLogger;

pub fn init(verbose: bool) -> Result<(), SetLoggerError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

pub fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let config = ImportConfig::load(&args.config)?.with_document_root(args.document_root);
    let mut store = CatalogStore::load(&args.catalog)?;

    let report = StockImporter::new(&config, &mut store).run(&args.xml_id)?;
    match report {
        RunReport::FileMissing(_) => Ok(()),
        RunReport::Completed(summary) => {
            if summary.has_changes() {
                store.save()?;
                info!("Catalog saved to {}", store.file_path.display());
            }
            info!("{}", summary);
            println!("Success");
            Ok(())
        }
    }
}
