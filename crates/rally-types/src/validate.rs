/// Shape checks applied to a request body after it has been deserialized.
///
/// Deserialization already rejects wrong types and missing required fields;
/// `validate` covers what serde cannot express (lengths, formats, ranges).
/// The error string is returned to the caller as the 400 detail.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Checks that `value` holds between `min` and `max` characters.
pub fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min {
        return Err(format!("data/{field} must NOT have fewer than {min} characters"));
    }
    if len > max {
        return Err(format!("data/{field} must NOT have more than {max} characters"));
    }
    Ok(())
}

/// Like [`check_len`], for fields that may be omitted.
pub fn check_opt_len(field: &str, value: Option<&str>, min: usize, max: usize) -> Result<(), String> {
    match value {
        Some(v) => check_len(field, v, min, max),
        None => Ok(()),
    }
}

pub fn check_non_negative(field: &str, value: i64) -> Result<(), String> {
    if value < 0 {
        return Err(format!("data/{field} must be >= 0"));
    }
    Ok(())
}

/// `local@domain.tld` where local is word chars, `.` or `-`, the domain is
/// alphanumerics, `.` or `-`, and the final label is at least two letters.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn check_email(field: &str, value: &str) -> Result<(), String> {
    check_len(field, value, 1, 256)?;
    if !is_email(value) {
        return Err(format!("data/{field} must match format \"email\""));
    }
    Ok(())
}
