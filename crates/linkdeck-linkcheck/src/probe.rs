//! HEAD → GET probing shared by the checker and the relay

use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, trace};

use crate::error::ProbeError;

/// What a probe learned about a URL
#[derive(Debug, Clone)]
pub(crate) struct ProbeOutcome {
    pub reachable: bool,
    pub status: u16,
    pub final_url: String,
    pub is_html: bool,
    /// HTML body (truncated), only when requested and the page is reachable
    pub body: Option<String>,
}

/// Probe `url`: HEAD first, GET if HEAD errors or answers neither 2xx nor 405
///
/// A 405 to HEAD means the server is up and only dislikes the method, so it
/// counts as reachable. With `max_body_bytes` set, a reachable HTML page's
/// body is read (issuing a GET if the answer came from HEAD).
pub(crate) async fn probe(
    http: &Client,
    url: &str,
    max_body_bytes: Option<usize>,
) -> Result<ProbeOutcome, ProbeError> {
    let (response, method) = match http.head(url).send().await {
        Ok(resp)
            if resp.status().is_success() || resp.status() == StatusCode::METHOD_NOT_ALLOWED =>
        {
            (resp, Method::HEAD)
        }
        Ok(resp) => {
            debug!(url, status = resp.status().as_u16(), "HEAD not ok, retrying with GET");
            (http.get(url).send().await?, Method::GET)
        }
        Err(e) => {
            debug!(url, error = %e, "HEAD failed, retrying with GET");
            (http.get(url).send().await?, Method::GET)
        }
    };

    let status = response.status();
    let reachable = status.is_success()
        || (method == Method::HEAD && status == StatusCode::METHOD_NOT_ALLOWED);
    let final_url = response.url().to_string();
    let is_html = is_html(&response);
    trace!(url, %method, status = status.as_u16(), reachable, "Probe answered");

    let body = match max_body_bytes {
        Some(limit) if reachable && is_html && status.is_success() => {
            if method == Method::GET {
                read_capped(response, limit).await.ok()
            } else {
                // HEAD carried no body; fetching it is best-effort
                match http.get(&final_url).send().await {
                    Ok(resp) if resp.status().is_success() => read_capped(resp, limit).await.ok(),
                    _ => None,
                }
            }
        }
        _ => None,
    };

    Ok(ProbeOutcome {
        reachable,
        status: status.as_u16(),
        final_url,
        is_html,
        body,
    })
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"))
}

async fn read_capped(mut response: Response, limit: usize) -> Result<String, reqwest::Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buf.len() >= limit {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
