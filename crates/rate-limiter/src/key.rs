//! Bucket-key canonicalization (spec §4.5).

use std::net::IpAddr;

const MAX_KEY_COMPONENT_LEN: usize = 256;

/// `baseUrl + path`, empty path mapped to `/`, repeated `/` collapsed to one,
/// truncated to 256 characters.
#[must_use]
pub fn canonicalize_path(base_url: &str, path: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    let combined = format!("{base_url}{path}");
    truncate_chars(&collapse_slashes(&combined), MAX_KEY_COMPONENT_LEN)
}

#[must_use]
pub fn canonicalize_host(host: &str) -> String {
    truncate_chars(host, MAX_KEY_COMPONENT_LEN)
}

/// `{rl:METHOD:HOST:PATH}:resource` — the `{…}` framing hints a
/// keyspace-sharded backend to co-locate the key.
#[must_use]
pub fn resource_bucket_key(method: &str, host: &str, path: &str) -> String {
    format!("{{rl:{method}:{host}:{path}}}:resource")
}

#[must_use]
pub fn ip_bucket_key(ip: IpAddr) -> String {
    format!("rl:ip:{ip}")
}

fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_was_slash = false;
    for c in s.chars() {
        if c == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        out.push(c);
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
