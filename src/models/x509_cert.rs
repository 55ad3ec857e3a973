//! The `x509_cert` resource type
//!
//! A [`CertificateRequest`] is the desired state of one certificate file. It is
//! built from the key/value parameters of a declaration and every field is
//! validated at assignment time, so a request that exists is always valid.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::error::ParamError;
use crate::utils::validation::{
    validate_absolute_path, validate_file_mode, validate_group_name, validate_user_name,
};

/// Default certificate validity in days
pub const DEFAULT_DAYS: u32 = 3650;

/// Parameters accepted by the `x509_cert` resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Path,
    Ensure,
    Days,
    Template,
    Password,
    Force,
    ReqExt,
    Csr,
    PrivateKey,
    Ca,
    Cakey,
    Mode,
    Owner,
    Group,
}

impl Param {
    /// All parameters, in the order they are validated
    pub const ALL: [Param; 14] = [
        Param::Path,
        Param::Ensure,
        Param::Days,
        Param::Template,
        Param::Password,
        Param::Force,
        Param::ReqExt,
        Param::Csr,
        Param::PrivateKey,
        Param::Ca,
        Param::Cakey,
        Param::Mode,
        Param::Owner,
        Param::Group,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Param::Path => "path",
            Param::Ensure => "ensure",
            Param::Days => "days",
            Param::Template => "template",
            Param::Password => "password",
            Param::Force => "force",
            Param::ReqExt => "req_ext",
            Param::Csr => "csr",
            Param::PrivateKey => "private_key",
            Param::Ca => "ca",
            Param::Cakey => "cakey",
            Param::Mode => "mode",
            Param::Owner => "owner",
            Param::Group => "group",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Param {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Param::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParamError::UnknownParameter {
                name: s.to_string(),
            })
    }
}

/// Whether the certificate should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl Ensure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ensure::Present => "present",
            Ensure::Absent => "absent",
        }
    }
}

/// Symbolic boolean used by `force`
///
/// Unlike `req_ext`, `force` accepts both booleans and their string spelling
/// and normalizes them to one of these two symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Force {
    True,
    #[default]
    False,
}

impl Force {
    pub fn as_str(&self) -> &'static str {
        match self {
            Force::True => "true",
            Force::False => "false",
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Force::True)
    }
}

/// File mode in leading-zero octal notation, e.g. `0640`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileMode(String);

impl FileMode {
    /// The mode exactly as it was written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permission bits
    pub fn bits(&self) -> u32 {
        // Validated as octal digits on construction
        u32::from_str_radix(&self.0, 8).unwrap_or_default()
    }
}

impl TryFrom<String> for FileMode {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if validate_file_mode(&value) {
            Ok(FileMode(value))
        } else {
            Err(ParamError::InvalidMode { value })
        }
    }
}

impl From<FileMode> for String {
    fn from(mode: FileMode) -> Self {
        mode.0
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validity period in days
///
/// Remembers whether it was given as a number or as a digit string so that it
/// reads back exactly as assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Days {
    count: u32,
    from_string: bool,
}

impl Days {
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The value in the form it was accepted
    pub fn to_value(&self) -> Value {
        if self.from_string {
            Value::String(self.count.to_string())
        } else {
            Value::from(self.count)
        }
    }
}

impl Default for Days {
    fn default() -> Self {
        Self {
            count: DEFAULT_DAYS,
            from_string: false,
        }
    }
}

/// Desired state of a single `x509_cert` resource
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    path: PathBuf,
    ensure: Ensure,
    days: Days,
    template: Option<PathBuf>,
    password: Option<String>,
    force: Force,
    req_ext: bool,
    csr: Option<PathBuf>,
    private_key: Option<PathBuf>,
    ca: Option<PathBuf>,
    cakey: Option<PathBuf>,
    mode: Option<FileMode>,
    owner: Option<String>,
    group: Option<String>,
}

impl CertificateRequest {
    /// Create a request for the certificate at `path` with default settings
    pub fn new(path: &str) -> Result<Self, ParamError> {
        let path = parse_absolute_path(Param::Path, &Value::String(path.to_string()))?;
        Ok(Self::with_path(path))
    }

    fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            ensure: Ensure::default(),
            days: Days::default(),
            template: None,
            password: None,
            force: Force::default(),
            req_ext: true,
            csr: None,
            private_key: None,
            ca: None,
            cakey: None,
            mode: None,
            owner: None,
            group: None,
        }
    }

    /// Build a request from a declaration's parameters
    ///
    /// Unknown keys are rejected before any value is looked at. `path` falls
    /// back to `title` when absent. Remaining parameters are validated in
    /// [`Param::ALL`] order and the first failure is returned. `null` values
    /// leave the default in place.
    pub fn from_params(title: Option<&str>, params: &Map<String, Value>) -> Result<Self, ParamError> {
        for key in params.keys() {
            key.parse::<Param>()?;
        }

        let path_value = match params.get(Param::Path.as_str()) {
            Some(value) if !value.is_null() => value.clone(),
            _ => title
                .map(|t| Value::String(t.to_string()))
                .ok_or(ParamError::MissingParameter {
                    param: Param::Path.as_str(),
                })?,
        };

        let mut request = Self::with_path(parse_absolute_path(Param::Path, &path_value)?);

        for param in Param::ALL.iter().skip(1) {
            match params.get(param.as_str()) {
                Some(Value::Null) | None => {}
                Some(value) => request.set(*param, value)?,
            }
        }

        request.validate()?;
        Ok(request)
    }

    /// Assign a single parameter
    ///
    /// On error the previously accepted value is kept.
    pub fn set(&mut self, param: Param, value: &Value) -> Result<(), ParamError> {
        match param {
            Param::Path => self.path = parse_absolute_path(param, value)?,
            Param::Ensure => self.ensure = parse_ensure(value)?,
            Param::Days => self.days = parse_days(value)?,
            Param::Template => self.template = Some(parse_absolute_path(param, value)?),
            Param::Password => self.password = Some(expect_str(param, value)?.to_string()),
            Param::Force => self.force = parse_force(value)?,
            Param::ReqExt => self.req_ext = parse_req_ext(value)?,
            Param::Csr => self.csr = Some(parse_absolute_path(param, value)?),
            Param::PrivateKey => self.private_key = Some(parse_absolute_path(param, value)?),
            Param::Ca => self.ca = Some(parse_absolute_path(param, value)?),
            Param::Cakey => self.cakey = Some(parse_absolute_path(param, value)?),
            Param::Mode => self.mode = Some(parse_mode(value)?),
            Param::Owner => self.owner = Some(parse_owner(value)?),
            Param::Group => self.group = Some(parse_group(value)?),
        }
        Ok(())
    }

    /// Read back an assigned parameter
    ///
    /// Returns `None` for optional parameters that were never set. `force`
    /// reads back as its symbolic form.
    pub fn get(&self, param: Param) -> Option<Value> {
        let path_value = |p: &Option<PathBuf>| p.as_deref().map(path_to_value);

        match param {
            Param::Path => Some(path_to_value(&self.path)),
            Param::Ensure => Some(Value::String(self.ensure.as_str().to_string())),
            Param::Days => Some(self.days.to_value()),
            Param::Template => path_value(&self.template),
            Param::Password => self.password.clone().map(Value::String),
            Param::Force => Some(Value::String(self.force.as_str().to_string())),
            Param::ReqExt => Some(Value::Bool(self.req_ext)),
            Param::Csr => path_value(&self.csr),
            Param::PrivateKey => path_value(&self.private_key),
            Param::Ca => path_value(&self.ca),
            Param::Cakey => path_value(&self.cakey),
            Param::Mode => self.mode.as_ref().map(|m| Value::String(m.to_string())),
            Param::Owner => self.owner.clone().map(Value::String),
            Param::Group => self.group.clone().map(Value::String),
        }
    }

    /// Cross-parameter rules, checked once all parameters are assigned
    pub fn validate(&self) -> Result<(), ParamError> {
        match (&self.ca, &self.cakey) {
            (Some(_), None) => Err(ParamError::MissingDependency {
                param: Param::Ca.as_str(),
                requires: Param::Cakey.as_str(),
            }),
            (None, Some(_)) => Err(ParamError::MissingDependency {
                param: Param::Cakey.as_str(),
                requires: Param::Ca.as_str(),
            }),
            _ => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure(&self) -> Ensure {
        self.ensure
    }

    pub fn days(&self) -> u32 {
        self.days.count()
    }

    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    /// Template used for generation: the configured one, or `<path>.cnf`
    pub fn effective_template(&self) -> PathBuf {
        self.template
            .clone()
            .unwrap_or_else(|| self.path.with_extension("cnf"))
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn force(&self) -> Force {
        self.force
    }

    pub fn req_ext(&self) -> bool {
        self.req_ext
    }

    pub fn csr(&self) -> Option<&Path> {
        self.csr.as_deref()
    }

    pub fn private_key(&self) -> Option<&Path> {
        self.private_key.as_deref()
    }

    /// Signing key: the configured one, or `<path>.key`
    pub fn effective_private_key(&self) -> PathBuf {
        self.private_key
            .clone()
            .unwrap_or_else(|| self.path.with_extension("key"))
    }

    pub fn ca(&self) -> Option<&Path> {
        self.ca.as_deref()
    }

    pub fn cakey(&self) -> Option<&Path> {
        self.cakey.as_deref()
    }

    pub fn mode(&self) -> Option<&FileMode> {
        self.mode.as_ref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("path", &self.path)
            .field("ensure", &self.ensure)
            .field("days", &self.days)
            .field("template", &self.template)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("force", &self.force)
            .field("req_ext", &self.req_ext)
            .field("csr", &self.csr)
            .field("private_key", &self.private_key)
            .field("ca", &self.ca)
            .field("cakey", &self.cakey)
            .field("mode", &self.mode)
            .field("owner", &self.owner)
            .field("group", &self.group)
            .finish()
    }
}

/// Render a value the way diagnostics show it: strings bare, everything else as JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn path_to_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn invalid(param: Param, value: &Value) -> ParamError {
    ParamError::InvalidValue {
        param: param.as_str(),
        value: render_value(value),
    }
}

fn expect_str(param: Param, value: &Value) -> Result<&str, ParamError> {
    value.as_str().ok_or_else(|| invalid(param, value))
}

fn parse_absolute_path(param: Param, value: &Value) -> Result<PathBuf, ParamError> {
    let s = expect_str(param, value)?;
    if !validate_absolute_path(s) {
        return Err(ParamError::NotAbsolute {
            param: param.as_str(),
            value: s.to_string(),
        });
    }
    Ok(PathBuf::from(s))
}

fn parse_ensure(value: &Value) -> Result<Ensure, ParamError> {
    match value.as_str() {
        Some("present") => Ok(Ensure::Present),
        Some("absent") => Ok(Ensure::Absent),
        _ => Err(invalid(Param::Ensure, value)),
    }
}

fn parse_days(value: &Value) -> Result<Days, ParamError> {
    let days = match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|d| u32::try_from(d).ok())
            .map(|count| Days {
                count,
                from_string: false,
            }),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<u32>().ok().map(|count| Days {
                count,
                from_string: true,
            })
        }
        _ => None,
    };

    match days {
        Some(d) if d.count > 0 => Ok(d),
        _ => Err(invalid(Param::Days, value)),
    }
}

fn parse_force(value: &Value) -> Result<Force, ParamError> {
    match value {
        Value::Bool(true) => Ok(Force::True),
        Value::Bool(false) => Ok(Force::False),
        Value::String(s) if s == "true" => Ok(Force::True),
        Value::String(s) if s == "false" => Ok(Force::False),
        _ => Err(invalid(Param::Force, value)),
    }
}

fn parse_req_ext(value: &Value) -> Result<bool, ParamError> {
    value.as_bool().ok_or_else(|| invalid(Param::ReqExt, value))
}

fn parse_mode(value: &Value) -> Result<FileMode, ParamError> {
    let s = expect_str(Param::Mode, value)?;
    FileMode::try_from(s.to_string())
}

fn parse_owner(value: &Value) -> Result<String, ParamError> {
    let s = expect_str(Param::Owner, value)?;
    if !validate_user_name(s) {
        return Err(ParamError::InvalidUser {
            value: s.to_string(),
        });
    }
    Ok(s.to_string())
}

fn parse_group(value: &Value) -> Result<String, ParamError> {
    let s = expect_str(Param::Group, value)?;
    if !validate_group_name(s) {
        return Err(ParamError::InvalidGroup {
            value: s.to_string(),
        });
    }
    Ok(s.to_string())
}
