//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating provider names
static PROVIDER_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9 ._-]*$").unwrap()
});

/// Regex for validating node names (hostname-like)
static NODE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.-]*$").unwrap()
});

/// Regex for validating provider type keys
static PROVIDER_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap()
});

/// Validate a provider display name
pub fn validate_provider_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 25 && PROVIDER_NAME_REGEX.is_match(name)
}

/// Validate a node name
pub fn validate_node_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 25 && NODE_NAME_REGEX.is_match(name)
}

/// Validate a provider type key such as `EC2_US_EAST`
pub fn validate_provider_type(provider_type: &str) -> bool {
    !provider_type.is_empty()
        && provider_type.len() <= 25
        && PROVIDER_TYPE_REGEX.is_match(provider_type)
}
