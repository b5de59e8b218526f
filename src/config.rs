use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use ErrorMessage::*;

pub const FILE_NAME: &str = "items_stock.csv";

/// Settings the import needs from the site configuration.
///
/// On disk this is a JSON document shaped like the site settings it mirrors:
///
/// ```json
/// { "document_root": "/var/www", "import": { "dir": { "stock": "/upload/import/" } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub document_root: Option<PathBuf>,
    #[serde(default)]
    pub import: Option<ImportSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSection {
    #[serde(default)]
    pub dir: ImportDirs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDirs {
    #[serde(default)]
    pub stock: Option<String>,
}

#[derive(Debug)]
pub enum ErrorMessage {
    ImportNotConfigured,
    DocumentRootNotSet,
    PathMissing,
    CouldNotLoadConfig,
}

impl ErrorMessage {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ImportNotConfigured => "Import configuration is not set",
            DocumentRootNotSet => "Document root is not set",
            PathMissing => "does not exist on the server",
            CouldNotLoadConfig => "Could not load configuration",
        }
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct ConfigError {
    message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Configuration Error: {}", self.message)
    }
}

impl Error for ConfigError {}

impl ConfigError {
    pub fn boxed(message: String) -> Box<dyn Error> {
        Box::new(ConfigError { message })
    }

    pub fn base(message: ErrorMessage) -> Box<dyn Error> {
        ConfigError::boxed(message.to_string())
    }
}

#[allow(dead_code)]
impl ImportConfig {
    pub fn new(document_root: &Path, stock_dir: &str) -> Self {
        ImportConfig {
            document_root: Some(document_root.to_path_buf()),
            import: Some(ImportSection {
                dir: ImportDirs {
                    stock: Some(stock_dir.to_string()),
                },
            }),
        }
    }

    pub fn load(file_path: &Path) -> Result<ImportConfig, Box<dyn Error>> {
        let file = File::open(file_path).map_err(|e| {
            ConfigError::boxed(format!("{} {}: {}", CouldNotLoadConfig, file_path.display(), e))
        })?;
        let config = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ConfigError::boxed(format!("{} {}: {}", CouldNotLoadConfig, file_path.display(), e))
        })?;
        debug!("Configuration loaded from {}", file_path.display());
        Ok(config)
    }

    pub fn with_document_root(mut self, document_root: Option<PathBuf>) -> Self {
        if document_root.is_some() {
            self.document_root = document_root;
        }
        self
    }

    /// Value of `import.dir.stock`, if it is set and non-empty.
    pub fn stock_dir_key(&self) -> Option<&str> {
        self.import
            .as_ref()
            .and_then(|import| import.dir.stock.as_deref())
            .filter(|dir| !dir.is_empty())
    }

    /// Directory the stock file is expected in. `import.dir.stock` is taken
    /// relative to the document root even when it starts with a slash.
    pub fn stock_dir(&self) -> Result<PathBuf, Box<dyn Error>> {
        let dir = self
            .stock_dir_key()
            .ok_or_else(|| ConfigError::base(ImportNotConfigured))?;
        let document_root = self
            .document_root
            .as_ref()
            .ok_or_else(|| ConfigError::base(DocumentRootNotSet))?;

        let resolved = document_root.join(dir.trim_start_matches('/'));
        if !resolved.exists() {
            return Err(ConfigError::boxed(format!(
                "Path {} {}",
                resolved.display(),
                PathMissing
            )));
        }
        Ok(resolved)
    }

    pub fn stock_file(&self) -> Result<PathBuf, Box<dyn Error>> {
        Ok(self.stock_dir()?.join(FILE_NAME))
    }
}
