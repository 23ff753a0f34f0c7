use serde::de::DeserializeOwned;

use rally_core::Denial;
use rally_types::validate::Validate;

/// Reads a JSON body into its declared request type and checks its shape.
/// Fields the type does not declare are dropped.
pub fn parse<T>(body: &[u8]) -> Result<T, Denial>
where
    T: DeserializeOwned + Validate,
{
    if body.is_empty() {
        return Err(Denial::invalid("request body must not be empty"));
    }
    let req: T = serde_json::from_slice(body).map_err(|e| Denial::invalid(e.to_string()))?;
    req.validate().map_err(Denial::InvalidInput)?;
    Ok(req)
}

/// Path ids that are not integers name nothing, so they are reported as
/// missing rather than malformed.
pub fn parse_id(raw: &str, missing: &str) -> Result<i64, Denial> {
    raw.parse::<i64>().map_err(|_| Denial::not_found(missing))
}
