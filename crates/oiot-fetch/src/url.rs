//! OIOT URL construction.

use oiot_types::{DeviceIdentity, OiotError};
use reqwest::Url;

/// Base URL of the OIOT device data endpoint.
pub const BASE_URL: &str = "https://oiot.ru/api/v1/device/data";

/// Builds the device data URL for `identity`.
///
/// URL format: `{base}?id={user_id}&token={token}[&keys[]={device_id}]`
///
/// # Example
///
/// ```
/// use oiot_fetch::url::site_url;
/// use oiot_types::{ConnectorConfig, DeviceIdentity};
///
/// let config = ConnectorConfig::new("1001", "tok", Some("42")).unwrap();
/// let identity = DeviceIdentity::from_config(&config);
/// let url = site_url("https://example.test/api", &identity).unwrap();
/// assert_eq!(url.as_str(), "https://example.test/api?id=1001&token=tok&keys%5B%5D=42");
/// ```
///
/// # Errors
///
/// Returns [`OiotError::CannotConnect`] if `base` is not a valid URL.
pub fn site_url(base: &str, identity: &DeviceIdentity) -> Result<Url, OiotError> {
    let mut url =
        Url::parse(base).map_err(|e| OiotError::CannotConnect(format!("invalid base URL '{base}': {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("id", identity.user_id())
            .append_pair("token", identity.token());
        if let Some(device_id) = identity.device_id() {
            query.append_pair("keys[]", device_id);
        }
    }
    Ok(url)
}

/// Returns `url` as a string with the token value masked, for logging.
#[must_use]
pub fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "token" { "***".to_string() } else { value.into_owned() };
            (key.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
