//! Manifest of `x509_cert` declarations
//!
//! A manifest is a YAML document with one top-level key per resource type.
//! Each entry maps a title to the declaration's parameters:
//!
//! ```yaml
//! x509_cert:
//!   /etc/ssl/certs/web.crt:
//!     days: 365
//!     mode: "0644"
//!   api certificate:
//!     path: /etc/ssl/certs/api.crt
//!     csr: /etc/ssl/csr/api.csr
//! ```
//!
//! Declarations keep the order in which they appear in the file.

use std::path::Path;

use serde_json::{Map, Value};

use crate::models::x509_cert::CertificateRequest;
use crate::utils::error::{AppError, AppResult, ParamError};

/// Resource type handled by this crate
pub const RESOURCE_TYPE: &str = "x509_cert";

/// A single resource declaration, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub title: String,
    pub params: Map<String, Value>,
}

impl Declaration {
    pub fn new(title: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            title: title.into(),
            params,
        }
    }

    /// Resource reference, e.g. `X509_cert[/etc/ssl/certs/web.crt]`
    pub fn reference(&self) -> String {
        format!("X509_cert[{}]", self.title)
    }

    /// Validate the declaration into a request
    pub fn to_request(&self) -> Result<CertificateRequest, ParamError> {
        CertificateRequest::from_params(Some(&self.title), &self.params)
    }
}

/// Ordered collection of declarations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub declarations: Vec<Declaration>,
}

impl Manifest {
    /// Load a manifest from a YAML file
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Manifest(format!("Failed to read manifest {:?}: {}", path, e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse a manifest from YAML text
    pub fn from_yaml(contents: &str) -> AppResult<Self> {
        let document: serde_norway::Value = serde_norway::from_str(contents)?;

        let root = match document {
            serde_norway::Value::Null => return Ok(Self::default()),
            serde_norway::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(AppError::Manifest(
                    "Manifest must be a mapping of resource types".to_string(),
                ))
            }
        };

        let mut declarations = Vec::new();

        for (type_key, entries) in root {
            let type_name = yaml_key(&type_key)?;
            if type_name != RESOURCE_TYPE {
                return Err(AppError::Manifest(format!(
                    "Unsupported resource type: {}",
                    type_name
                )));
            }

            let entries = match entries {
                serde_norway::Value::Null => continue,
                serde_norway::Value::Mapping(entries) => entries,
                _ => {
                    return Err(AppError::Manifest(format!(
                        "{} must map titles to parameters",
                        RESOURCE_TYPE
                    )))
                }
            };

            for (title, params) in entries {
                let title = yaml_key(&title)?;
                let params = match serde_json::to_value(&params) {
                    Ok(Value::Object(map)) => map,
                    Ok(Value::Null) => Map::new(),
                    Ok(_) => {
                        return Err(AppError::Manifest(format!(
                            "Parameters of X509_cert[{}] must be a mapping",
                            title
                        )))
                    }
                    Err(e) => {
                        return Err(AppError::Manifest(format!(
                            "Unsupported value in X509_cert[{}]: {}",
                            title, e
                        )))
                    }
                };

                if declarations.iter().any(|d: &Declaration| d.title == title) {
                    return Err(AppError::Manifest(format!(
                        "Duplicate declaration: X509_cert[{}]",
                        title
                    )));
                }

                declarations.push(Declaration::new(title, params));
            }
        }

        Ok(Self { declarations })
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

fn yaml_key(key: &serde_norway::Value) -> AppResult<String> {
    key.as_str()
        .map(String::from)
        .ok_or_else(|| AppError::Manifest(format!("Keys must be strings, got {:?}", key)))
}
