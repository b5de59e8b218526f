use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error,
    fmt::{self, Display, Formatter},
};
use ErrorMessage::*;

pub const PROP_NAME: &str = "PROPERTY_STOCK";
pub const STOCK_KEY: &str = "STOCK";

/// Warehouse codes a product is carried in. Kept as a set so a code can
/// never appear twice.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockList(BTreeSet<String>);

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub iblock_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "STOCK", default)]
    pub stock: StockList,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct ProductError {
    pub level: String,
    pub message: String,
}

impl Display for ProductError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} Error: {}", self.level, self.message)
    }
}

impl Error for ProductError {}

impl ProductError {
    pub fn boxed(level: &str, message: String) -> Box<dyn Error> {
        Box::new(ProductError {
            level: level.to_string(),
            message,
        })
    }

    pub fn product(message: String) -> Box<dyn Error> {
        ProductError::boxed("Product", message)
    }

    pub fn row(message: String) -> Box<dyn Error> {
        ProductError::boxed("Row", message)
    }
}

#[derive(Debug)]
pub enum ErrorMessage {
    ProductNotFound,
    InvalidProductId,
    MissingProductId,
}

impl ErrorMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductNotFound => "Product not found",
            InvalidProductId => "Invalid product ID",
            MissingProductId => "Missing product ID",
        }
    }

    pub(crate) fn with_id(&self, product_id: u64) -> String {
        format!("{} — ID {}", self.as_str(), product_id)
    }

    pub(crate) fn with_value(&self, value: &str) -> String {
        format!("{}: {:?}", self.as_str(), value)
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[allow(dead_code)]
impl StockList {
    pub fn new() -> Self {
        StockList(BTreeSet::new())
    }

    pub fn contains(&self, xml_id: &str) -> bool {
        self.0.contains(xml_id)
    }

    /// Returns `false` when the code was already listed.
    pub fn insert(&mut self, xml_id: &str) -> bool {
        self.0.insert(xml_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for StockList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StockList(iter.into_iter().map(Into::into).collect())
    }
}

impl Display for StockList {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let codes: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", codes.join(", "))
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Product: {}\n ID: {}, Iblock: {}, Stock: {}",
            self.name, self.id, self.iblock_id, self.stock,
        )
    }
}

#[allow(dead_code)]
impl Product {
    pub fn new(id: u64, iblock_id: u64, name: &str) -> Self {
        Product {
            id,
            iblock_id,
            name: name.to_string(),
            stock: StockList::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_stock<S: Into<String>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        self.stock = codes.into_iter().collect();
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }
}

/// Parses the product identifier column the way the catalog expects it:
/// surrounding blanks and a byte-order mark are tolerated, anything else
/// that is not an unsigned integer is rejected.
pub fn parse_product_id(value: &str) -> Result<u64, Box<dyn Error>> {
    let trimmed = value.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(ProductError::row(MissingProductId.as_str().to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| ProductError::row(InvalidProductId.with_value(value)))
}
