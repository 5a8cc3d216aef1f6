use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// External blob store kinds.
///
/// Absence of a file store (`None` in configuration) means attachments are
/// embedded in the document records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStoreKind {
    S3,
    Local,
}

impl FromStr for FileStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(FileStoreKind::S3),
            "local" => Ok(FileStoreKind::Local),
            _ => Err(anyhow::anyhow!("Invalid file store: {}", s)),
        }
    }
}

impl Display for FileStoreKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStoreKind::S3 => write!(f, "s3"),
            FileStoreKind::Local => write!(f, "local"),
        }
    }
}
