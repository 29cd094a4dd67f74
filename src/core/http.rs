use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

pub const APP_USER_AGENT: &str = concat!("Launchpad/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}

/// GET a URL and fail on any non-2xx status.
async fn get_checked(client: &Client, url: &str, accept: &str) -> LauncherResult<reqwest::Response> {
    debug!("GET {}", url);
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, accept)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LauncherError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp)
}

pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> LauncherResult<T> {
    let raw = get_checked(client, url, "application/json")
        .await?
        .text()
        .await?;
    Ok(serde_json::from_str(&raw)?)
}

pub async fn get_string(client: &Client, url: &str) -> LauncherResult<String> {
    Ok(get_checked(client, url, "text/plain").await?.text().await?)
}

/// GET a binary resource, returning the response so the body can be streamed.
pub async fn get_binary(client: &Client, url: &str) -> LauncherResult<reqwest::Response> {
    get_checked(client, url, "application/octet-stream").await
}

/// POST a JSON body and return only the status code.
pub async fn post_json_for_status(
    client: &Client,
    url: &str,
    body: &serde_json::Value,
) -> LauncherResult<u16> {
    debug!("POST {}", url);
    let resp = client
        .post(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(body)
        .send()
        .await?;
    Ok(resp.status().as_u16())
}

/// Fetch the detached `.sha1` digest published next to a Maven artifact.
pub async fn get_sha1_digest(client: &Client, download_url: &str) -> LauncherResult<String> {
    let raw = get_string(client, &format!("{}.sha1", download_url)).await?;
    // Some repositories append the file name after the digest.
    let digest = raw.split_whitespace().next().unwrap_or_default();
    Ok(digest.to_ascii_lowercase())
}
