use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the consolidated parts manifest, stored next to the model.
pub const BUNDLE_FILE_NAME: &str = "parts-bundle.json";

/// One model's full part dependency closure as a single document.
///
/// `parts` maps library-relative paths (`parts/3001.dat`, `p/stud.dat`) to
/// raw part-file text. Sorted keys keep iteration order stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartsBundle {
    pub version: u32,
    #[serde(rename = "ldconfig", default)]
    pub ldconfig_text: String,
    #[serde(default)]
    pub parts: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("parts bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PartsBundle {
    pub fn from_json(text: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
