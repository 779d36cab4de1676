//! API request handlers

mod boxcontrollers;
mod events;
mod health;
mod pods;

pub use boxcontrollers::*;
pub use events::*;
pub use health::*;
pub use pods::*;

use crate::error::{ApiError, ApiResult};

const MAX_NAME_LEN: usize = 63;

/// Namespaces and names are DNS labels: lowercase alphanumerics and '-',
/// starting and ending with an alphanumeric.
pub(crate) fn validate_name(field: &str, value: &str) -> ApiResult<()> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !value.starts_with('-') && !value.ends_with('-');

    if value.is_empty() || value.len() > MAX_NAME_LEN || !valid_chars || !valid_edges {
        return Err(ApiError::Validation(format!(
            "{} '{}' must be a DNS label of at most {} characters",
            field, value, MAX_NAME_LEN
        )));
    }
    Ok(())
}
