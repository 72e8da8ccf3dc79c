use crate::error::{AppError, AppResult};

// Account field limits, shared by registration and profile updates.
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PHONE_LEN: usize = 50;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_COMPANY_LEN: usize = 200;

/// Trims `value` and rejects it when blank or longer than `max` characters.
pub fn required_text(field: &str, value: &str, max: Option<usize>) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    check_length(field, value, max)?;
    Ok(value.to_string())
}

/// Like [`required_text`] for an optional field: absent stays absent, blank maps to `None`.
pub fn optional_text(field: &str, value: Option<&str>, max: Option<usize>) -> AppResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            check_length(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

/// Wraps a search term for a substring `ILIKE`, escaping the wildcards it
/// contains so `%` and `_` match literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn check_length(field: &str, value: &str, max: Option<usize>) -> AppResult<()> {
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(AppError::BadRequest(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(())
}
