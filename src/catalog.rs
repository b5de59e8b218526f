use crate::{
    product::{ErrorMessage::ProductNotFound, Product, ProductError, StockList, STOCK_KEY},
    reference::{ReferenceError, ReferenceLookup, ReferenceRow},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    fs::File,
    io::{self, BufReader, Write},
    path::{Path, PathBuf},
};
use ErrorMessage::*;

pub const CATALOG_CODE: &str = "catalog";
pub const CATALOG_TYPE: &str = "catalog";

/// A catalog block: the collection a product belongs to.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Iblock {
    pub id: u64,
    pub code: String,
    pub iblock_type: String,
}

/// Product side of the catalog backend.
pub trait Catalog {
    fn iblock_id(&self, code: &str, iblock_type: &str) -> Option<u64>;

    fn product_exists(&self, iblock_id: u64, product_id: u64) -> bool;

    /// Current stock codes of a product. A product missing from the block
    /// has no values.
    fn stock_values(&self, iblock_id: u64, product_id: u64) -> StockList;

    /// Replaces the whole stock property of a product.
    fn set_stock_values(
        &mut self,
        iblock_id: u64,
        product_id: u64,
        values: StockList,
    ) -> Result<(), Box<dyn Error>>;
}

/// Catalog snapshot kept in a JSON file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogStore {
    #[serde(skip)]
    pub file_path: PathBuf,
    #[serde(default)]
    pub iblocks: Vec<Iblock>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub reference_tables: HashMap<String, Vec<ReferenceRow>>,
}

#[derive(Debug)]
pub enum ErrorMessage {
    CouldNotLoadCatalog,
    CouldNotSaveCatalog,
    CatalogNotFound,
}

impl ErrorMessage {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CouldNotLoadCatalog => "Could not load catalog",
            CouldNotSaveCatalog => "Could not save catalog",
            CatalogNotFound => "Catalog iblock not found",
        }
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct CatalogError {
    message: String,
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Catalog Error: {}", self.message)
    }
}

impl Error for CatalogError {}

impl CatalogError {
    pub fn boxed(message: String) -> Box<dyn Error> {
        Box::new(CatalogError { message })
    }

    pub fn with_path(message: ErrorMessage, path: &Path, cause: impl Display) -> Box<dyn Error> {
        CatalogError::boxed(format!("{} {}: {}", message, path.display(), cause))
    }
}

/// Resolves the id of the product catalog block.
pub fn catalog_iblock_id<C: Catalog + ?Sized>(catalog: &C) -> Result<u64, Box<dyn Error>> {
    catalog.iblock_id(CATALOG_CODE, CATALOG_TYPE).ok_or_else(|| {
        CatalogError::boxed(format!(
            "{} (code {}, type {})",
            CatalogNotFound, CATALOG_CODE, CATALOG_TYPE
        ))
    })
}

#[allow(dead_code)]
impl CatalogStore {
    pub fn new(file_path: &Path) -> Self {
        CatalogStore {
            file_path: file_path.to_path_buf(),
            ..CatalogStore::default()
        }
    }

    pub fn load(file_path: &Path) -> Result<CatalogStore, Box<dyn Error>> {
        let file = File::open(file_path)
            .map_err(|e| CatalogError::with_path(CouldNotLoadCatalog, file_path, e))?;
        let reader = BufReader::new(file);
        let mut store: CatalogStore = serde_json::from_reader(reader)
            .map_err(|e| CatalogError::with_path(CouldNotLoadCatalog, file_path, e))?;
        store.file_path = file_path.to_path_buf();
        info!(
            "Loaded catalog {} ({} products)",
            file_path.display(),
            store.products.len()
        );
        Ok(store)
    }

    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        self.save_as(&self.file_path)
            .map_err(|e| CatalogError::with_path(CouldNotSaveCatalog, &self.file_path, e))
    }

    pub fn save_as(&self, file_path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut file = File::create(file_path)?;
        file.write_all(json.as_bytes())
    }

    pub fn add_iblock(&mut self, id: u64, code: &str, iblock_type: &str) {
        self.iblocks.push(Iblock {
            id,
            code: code.to_string(),
            iblock_type: iblock_type.to_string(),
        });
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.push(product);
    }

    pub fn add_reference_row(&mut self, table_name: &str, row: ReferenceRow) {
        self.reference_tables
            .entry(table_name.to_string())
            .or_default()
            .push(row);
    }

    pub fn product(&self, iblock_id: u64, product_id: u64) -> Option<&Product> {
        self.products
            .iter()
            .find(|product| product.id == product_id && product.iblock_id == iblock_id)
    }

    fn product_mut(&mut self, iblock_id: u64, product_id: u64) -> Option<&mut Product> {
        self.products
            .iter_mut()
            .find(|product| product.id == product_id && product.iblock_id == iblock_id)
    }
}

impl Catalog for CatalogStore {
    fn iblock_id(&self, code: &str, iblock_type: &str) -> Option<u64> {
        self.iblocks
            .iter()
            .find(|iblock| iblock.code == code && iblock.iblock_type == iblock_type)
            .map(|iblock| iblock.id)
    }

    fn product_exists(&self, iblock_id: u64, product_id: u64) -> bool {
        self.product(iblock_id, product_id).is_some()
    }

    fn stock_values(&self, iblock_id: u64, product_id: u64) -> StockList {
        self.product(iblock_id, product_id)
            .map(|product| product.stock.clone())
            .unwrap_or_default()
    }

    fn set_stock_values(
        &mut self,
        iblock_id: u64,
        product_id: u64,
        values: StockList,
    ) -> Result<(), Box<dyn Error>> {
        match self.product_mut(iblock_id, product_id) {
            Some(product) => {
                debug!("Product {} {} set to {}", product_id, STOCK_KEY, values);
                product.stock = values;
                Ok(())
            }
            None => Err(ProductError::product(ProductNotFound.with_id(product_id))),
        }
    }
}

impl ReferenceLookup for CatalogStore {
    fn count_by_xml_id(&self, table_name: &str, xml_id: &str) -> Result<usize, Box<dyn Error>> {
        match self.reference_tables.get(table_name) {
            Some(rows) => Ok(rows.iter().filter(|row| row.xml_id == xml_id).count()),
            None => Err(ReferenceError::table_missing(table_name)),
        }
    }
}
