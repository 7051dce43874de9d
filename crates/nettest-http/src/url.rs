//! `GET` by URL.

use crate::connection::HttpConnection;
use crate::error::HttpError;
use crate::response::Response;
use ::url::Url;

/// Host, port and request target of a plain `http://` URL.
pub fn split_url(url: &str) -> Result<(String, u16, String), HttpError> {
    let parsed = Url::parse(url)?;
    if parsed.scheme() != "http" {
        return Err(HttpError::UnsupportedUrl(url.to_string()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| HttpError::UnsupportedUrl(url.to_string()))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);

    let mut target = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        target.push('?');
        target.push_str(query);
    }
    Ok((host, port, target))
}

/// Send a `GET` request and read the whole response.
pub fn get(url: &str) -> Result<Response, HttpError> {
    let (host, port, target) = split_url(url)?;
    let mut connection = HttpConnection::new(host, port);
    connection.request("GET", &target, &[], None)?;
    connection.get_response()
}
