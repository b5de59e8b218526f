use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{self, Display, Formatter},
};
use ErrorMessage::*;

pub const HL_BLOCK_TABLE_NAME: &str = "reference_stocks";
pub const XML_ID_FIELD: &str = "UF_XML_ID";

/// One row of a highload reference table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    #[serde(rename = "UF_XML_ID")]
    pub xml_id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Read access to the reference ("highload") tables of the catalog backend.
pub trait ReferenceLookup {
    /// Number of rows in `table_name` whose `UF_XML_ID` equals `xml_id`.
    ///
    /// Fails when the table is not registered at all.
    fn count_by_xml_id(&self, table_name: &str, xml_id: &str) -> Result<usize, Box<dyn Error>>;
}

#[derive(Debug)]
pub enum ErrorMessage {
    HighloadBlockNotFound,
    WarehouseNotFound,
}

impl ErrorMessage {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            HighloadBlockNotFound => "Highload block not found",
            WarehouseNotFound => "Warehouse not found",
        }
    }

    pub(crate) fn named(&self, name: &str) -> String {
        format!("{}: {}", self.as_str(), name)
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct ReferenceError {
    message: String,
}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Reference Error: {}", self.message)
    }
}

impl Error for ReferenceError {}

impl ReferenceError {
    pub fn boxed(message: String) -> Box<dyn Error> {
        Box::new(ReferenceError { message })
    }

    pub fn table_missing(table_name: &str) -> Box<dyn Error> {
        ReferenceError::boxed(HighloadBlockNotFound.named(table_name))
    }

    pub fn warehouse_missing(xml_id: &str) -> Box<dyn Error> {
        ReferenceError::boxed(WarehouseNotFound.named(xml_id))
    }
}

#[allow(dead_code)]
impl ReferenceRow {
    pub fn new(xml_id: &str) -> Self {
        ReferenceRow {
            xml_id: xml_id.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Whether the warehouse `xml_id` is listed in the stock reference table.
pub fn stock_exists<R: ReferenceLookup + ?Sized>(
    lookup: &R,
    xml_id: &str,
) -> Result<bool, Box<dyn Error>> {
    let count = lookup.count_by_xml_id(HL_BLOCK_TABLE_NAME, xml_id)?;
    debug!(
        "{} rows in {} match {} = {}",
        count, HL_BLOCK_TABLE_NAME, XML_ID_FIELD, xml_id
    );
    Ok(count > 0)
}
