use crate::error::{Error, Result};

/// Resolves an optional `N` query parameter against its default.
///
/// Zero is rejected. Counts larger than the available items are accepted;
/// listings simply return everything there is.
pub fn validate_count(name: &str, requested: Option<usize>, default: usize) -> Result<usize> {
    let count = requested.unwrap_or(default);

    if count == 0 {
        return Err(Error::InvalidInput(format!("{} must be greater than 0", name)));
    }

    Ok(count)
}

pub fn validate_search_query(query: &str) -> Result<&str> {
    if query.len() > 255 {
        return Err(Error::InvalidInput("query too long (max 255 characters)".to_string()));
    }
    Ok(query)
}
