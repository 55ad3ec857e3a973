//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating file modes (leading zero, octal digits)
static FILE_MODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^0[0-7]{3,4}$").unwrap()
});

/// Regex for validating user and group names
static ACCOUNT_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*\$?$").unwrap()
});

/// Validate that a path starts at the filesystem root
pub fn validate_absolute_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Validate a file mode string such as `0644`
pub fn validate_file_mode(mode: &str) -> bool {
    FILE_MODE_REGEX.is_match(mode)
}

/// Validate a user name
pub fn validate_user_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 32 && ACCOUNT_NAME_REGEX.is_match(name)
}

/// Validate a group name
pub fn validate_group_name(name: &str) -> bool {
    // Same rules as user names on every platform we target
    validate_user_name(name)
}
