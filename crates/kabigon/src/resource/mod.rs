// ABOUTME: HTTP fetching shared by the network loaders, with SSRF protection and size limits.
// ABOUTME: Maps transport failures into the loader failure taxonomy and decodes bodies by charset.

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;

use crate::error::LoadError;
use crate::options::HttpOptions;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

const ACCESS_SUGGESTION: &str = "Check that the URL is valid and accessible.";

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    // RFC1918, loopback, link-local
    ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.0/8", "169.254.0.0/16"]
        .iter()
        .map(|n| n.parse().unwrap())
        .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    // unique local, link-local
    ["fc00::/7", "fe80::/10"]
        .iter()
        .map(|n| n.parse().unwrap())
        .collect()
});

/// Options for fetching a resource.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            allow_private_networks: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&HttpOptions> for FetchOptions {
    fn from(opts: &HttpOptions) -> Self {
        Self {
            headers: opts.headers.clone(),
            allow_private_networks: opts.allow_private_networks,
            timeout: opts.timeout,
        }
    }
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, using charset hints from the content-type header.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }

    /// Returns true if the content type contains any of `needles`.
    pub fn content_type_contains(&self, needles: &[&str]) -> bool {
        let ct = self.content_type.as_deref().unwrap_or("");
        needles.iter().any(|n| ct.contains(n))
    }
}

/// Check if an IP address is in a private/reserved range.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => ip.is_loopback() || PRIVATE_V6.iter().any(|net| net.contains(ip)),
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

/// Parse `url` and require an http(s) scheme. Anything else is not ours to load.
pub fn parse_http_url(url: &str) -> Result<Url, LoadError> {
    if url.is_empty() {
        return Err(LoadError::not_applicable(url, "empty URL"));
    }
    let parsed = Url::parse(url)
        .map_err(|e| LoadError::not_applicable(url, format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(LoadError::not_applicable(
            url,
            format!("unsupported URL scheme: {}", other),
        )),
    }
}

/// Reject hosts that are, or resolve to, private addresses.
pub(crate) async fn guard_host(target: &Url, url: &str) -> Result<(), LoadError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(LoadError::not_applicable(
                url,
                "private network addresses are not allowed",
            ));
        }
        return Ok(());
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        LoadError::content(
            url,
            format!("DNS lookup failed: {}", e),
            Some(ACCESS_SUGGESTION.to_string()),
        )
    })?;

    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(LoadError::not_applicable(
                url,
                "private network addresses are not allowed",
            ));
        }
    }
    Ok(())
}

/// Whether a redirect may go to `next`. Only literal IPs are judged here;
/// hostnames are resolved by the post-response guard on the final URL, so the
/// policy never blocks a runtime thread on DNS.
fn redirect_allowed(next: &Url) -> bool {
    match next.host() {
        Some(url::Host::Ipv4(ip)) => !is_private_ip(&IpAddr::V4(ip)),
        Some(url::Host::Ipv6(ip)) => !is_private_ip(&IpAddr::V6(ip)),
        Some(url::Host::Domain(_)) | None => true,
    }
}

/// Redirect policy that refuses hops to private addresses unless allowed.
fn redirect_policy(allow_private: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if allow_private || redirect_allowed(attempt.url()) {
            attempt.follow()
        } else {
            attempt.error("redirect to private IP blocked")
        }
    })
}

/// Build an async HTTP client whose redirects honor the private network setting.
pub fn build_client(opts: &HttpOptions) -> Result<reqwest::Client, LoadError> {
    reqwest::Client::builder()
        .redirect(redirect_policy(opts.allow_private_networks))
        .user_agent(&opts.user_agent)
        .timeout(opts.timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| LoadError::unexpected(anyhow::anyhow!("failed to build HTTP client: {}", e)))
}

/// Blocking counterpart of [`build_client`], for loaders that run on worker threads.
pub fn build_blocking_client(opts: &HttpOptions) -> Result<reqwest::blocking::Client, LoadError> {
    reqwest::blocking::Client::builder()
        .redirect(redirect_policy(opts.allow_private_networks))
        .user_agent(&opts.user_agent)
        .timeout(opts.timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| LoadError::unexpected(anyhow::anyhow!("failed to build HTTP client: {}", e)))
}

/// Blocking host check with the same rules as the async guard.
pub fn guard_host_blocking(target: &Url, url: &str) -> Result<(), LoadError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = target.port_or_known_default().unwrap_or(80);

    let ips: Vec<IpAddr> = match host.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                LoadError::content(
                    url,
                    format!("DNS lookup failed: {}", e),
                    Some(ACCESS_SUGGESTION.to_string()),
                )
            })?
            .map(|sa| sa.ip())
            .collect(),
    };

    if ips.iter().any(is_private_ip) {
        return Err(LoadError::not_applicable(
            url,
            "private network addresses are not allowed",
        ));
    }
    Ok(())
}

/// Translate a reqwest failure into the loader taxonomy.
pub fn classify_request_error(url: &str, timeout: Duration, err: reqwest::Error) -> LoadError {
    if err.is_timeout() {
        return LoadError::timeout(
            url,
            timeout,
            Some("The server is slow to respond; try a longer timeout.".to_string()),
        );
    }
    if err.is_connect() || err.is_request() || err.is_redirect() || err.is_status() {
        return LoadError::content(
            url,
            format!("HTTP request failed: {}", err),
            Some(ACCESS_SUGGESTION.to_string()),
        );
    }
    LoadError::unexpected(err)
}

/// Fetch a resource from the given URL.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, LoadError> {
    let parsed_url = parse_http_url(url)?;

    if !opts.allow_private_networks {
        guard_host(&parsed_url, url).await?;
    }

    let mut request = client.get(parsed_url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    debug!(url, "sending request");
    let response = request
        .send()
        .await
        .map_err(|e| classify_request_error(url, opts.timeout, e))?;

    if !opts.allow_private_networks {
        let final_url = response.url().clone();
        guard_host(&final_url, url).await?;
    }

    let content_length = response.content_length().or_else(|| {
        response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    });
    if let Some(len) = content_length {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(LoadError::content(url, "content too large", None));
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_request_error(url, opts.timeout, e))?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(LoadError::content(url, "content too large", None));
    }

    if status != 200 {
        return Err(LoadError::content(
            url,
            format!("HTTP status {}", status),
            Some(ACCESS_SUGGESTION.to_string()),
        ));
    }

    debug!(url, status, bytes = body.len(), "fetched");
    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use httpmock::prelude::*;

    fn open_opts() -> FetchOptions {
        FetchOptions {
            allow_private_networks: true,
            ..Default::default()
        }
    }

    fn test_client() -> reqwest::Client {
        build_client(&HttpOptions::new().allow_private_networks(true)).unwrap()
    }

    #[tokio::test]
    async fn fetch_ok_utf8() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/test");
            then.status(200)
                .header("content-type", "text/plain; charset=utf-8")
                .body("hello");
        });

        let result = fetch(&test_client(), &server.url("/test"), &open_opts())
            .await
            .unwrap();
        mock.assert();
        assert_eq!(result.status, 200);
        assert_eq!(result.text(), "hello");
        assert!(result.content_type_contains(&["text/plain"]));
    }

    #[tokio::test]
    async fn fetch_decodes_declared_charset() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/latin1");
            then.status(200)
                .header("content-type", "text/plain; charset=iso-8859-1")
                .body(vec![0x63, 0x61, 0x66, 0xe9]);
        });

        let result = fetch(&test_client(), &server.url("/latin1"), &open_opts())
            .await
            .unwrap();
        assert_eq!(result.text(), "café");
    }

    #[tokio::test]
    async fn fetch_non_200_is_content_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("nope");
        });

        let err = fetch(&test_client(), &server.url("/missing"), &open_opts())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ContentError);
        assert!(err.to_string().contains("HTTP status 404"));
    }

    #[tokio::test]
    async fn fetch_sends_custom_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/h").header("cookie", "over18=1");
            then.status(200).body("ok");
        });

        let mut opts = open_opts();
        opts.headers.insert("Cookie".to_string(), "over18=1".to_string());
        fetch(&test_client(), &server.url("/h"), &opts).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn fetch_blocks_private_ip_by_default() {
        let err = fetch(&test_client(), "http://127.0.0.1:9/x", &FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotApplicable);
        assert!(err.to_string().contains("private"));
    }

    #[tokio::test]
    async fn fetch_rejects_non_http_scheme() {
        let err = fetch(&test_client(), "ftp://example.com/file", &open_opts())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotApplicable);
    }

    #[tokio::test]
    async fn fetch_rejects_garbage_url() {
        let err = fetch(&test_client(), "not-a-valid-url", &open_opts())
            .await
            .unwrap_err();
        assert!(err.is_not_applicable());
    }

    #[test]
    fn private_ranges() {
        assert!(is_private_ip(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_ip(&"192.168.0.10".parse().unwrap()));
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(!is_private_ip(&"93.184.216.34".parse().unwrap()));
        assert!(!is_private_ip(&"2606:2800:220:1::1".parse().unwrap()));
    }

    #[test]
    fn redirects_judge_literal_ips_without_resolving() {
        for blocked in ["http://127.0.0.1/admin", "http://10.0.0.5:8080/", "http://[::1]/x"] {
            assert!(!redirect_allowed(&Url::parse(blocked).unwrap()), "{}", blocked);
        }
        for allowed in [
            "https://93.184.216.34/",
            "https://example.com/next",
            "https://host.invalid/next",
        ] {
            assert!(redirect_allowed(&Url::parse(allowed).unwrap()), "{}", allowed);
        }
    }

    #[tokio::test]
    async fn fetch_rejects_redirect_to_private_ip() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/hop");
            then.status(302).header("location", "http://127.0.0.1:9/admin");
        });

        let client = build_client(&HttpOptions::default()).unwrap();
        let opts = open_opts();
        let err = fetch(&client, &server.url("/hop"), &opts).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ContentError);
        assert!(err.to_string().contains("redirect"), "got: {}", err);
    }

    #[test]
    fn blocking_guard_matches_async_rules() {
        let local = Url::parse("http://127.0.0.1:8080/doc.pdf").unwrap();
        let err = guard_host_blocking(&local, local.as_str()).unwrap_err();
        assert!(err.is_not_applicable());

        let public = Url::parse("http://93.184.216.34/doc.pdf").unwrap();
        assert!(guard_host_blocking(&public, public.as_str()).is_ok());
    }

    #[test]
    fn charset_from_content_type() {
        assert_eq!(
            extract_charset("text/html; charset=\"UTF-8\""),
            Some("utf-8".to_string())
        );
        assert_eq!(extract_charset("text/html"), None);
    }
}
