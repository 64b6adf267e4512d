//! URL and path arithmetic for manifest resolution.
//!
//! All operations here are purely lexical: no filesystem or network access.
//! A URL is either absolute (`https://`, `ssh://`, `file://`, or the
//! scp-like `user@host:path` form) or a relative path that gets resolved
//! against the URL of the project whose manifest declared it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the scp-like `user@host:path` remote form.
static SCP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/@]+@[^/:]+:").expect("scp regex must compile"));

/// Check whether a URL is absolute.
///
/// Plain filesystem paths (even `/`-rooted ones) count as relative; a local
/// path must be spelled `file://...` to be absolute.
pub fn is_absolute(url: &str) -> bool {
    url.contains("://") || SCP_RE.is_match(url)
}

/// The non-path prefix of an absolute URL, e.g. `https://host` or
/// `git@host:`, plus the path component that follows it.
struct SplitUrl<'a> {
    prefix: &'a str,
    path: &'a str,
    /// Absolute bases clamp `..` at the root instead of escaping it.
    clamp: bool,
}

fn split_url(url: &str) -> SplitUrl<'_> {
    if let Some(rest) = url.strip_prefix("file://") {
        return SplitUrl {
            prefix: "file://",
            path: rest,
            clamp: true,
        };
    }
    if let Some(scheme_end) = url.find("://") {
        let after = &url[scheme_end + 3..];
        let host_len = after.find('/').unwrap_or(after.len());
        let split = scheme_end + 3 + host_len;
        return SplitUrl {
            prefix: &url[..split],
            path: &url[split..],
            clamp: true,
        };
    }
    if let Some(m) = SCP_RE.find(url) {
        return SplitUrl {
            prefix: &url[..m.end()],
            path: &url[m.end()..],
            clamp: true,
        };
    }
    SplitUrl {
        prefix: "",
        path: url,
        clamp: false,
    }
}

/// Collapse `.` and `..` segments of `rel` applied on top of `base_segments`.
fn apply_segments(stack: &mut Vec<String>, rel: &str, clamp: bool) {
    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                let poppable = stack.last().map(|s| s != "..").unwrap_or(false);
                if poppable {
                    stack.pop();
                } else if !clamp {
                    stack.push("..".to_string());
                }
            }
            _ => stack.push(seg.to_string()),
        }
    }
}

/// Join a base URL with a relative segment.
///
/// If `rel` is itself absolute it is returned unchanged. Otherwise `rel` is
/// appended to the path component of `base` (the base is treated as a
/// directory) and `.`/`..` segments are collapsed lexically. The scheme and
/// host of the base are preserved, including the `user@host:` form.
pub fn join(base: &str, rel: &str) -> String {
    if is_absolute(rel) {
        return rel.to_string();
    }

    let split = split_url(base);
    let rooted = split.path.starts_with('/');

    let mut stack: Vec<String> = split
        .path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect();
    apply_segments(&mut stack, rel, split.clamp);

    let joined = stack.join("/");
    match (split.prefix.is_empty(), rooted) {
        (true, true) => format!("/{}", joined),
        (true, false) => joined,
        (false, _) => {
            if split.prefix.ends_with(':') && !rooted {
                format!("{}{}", split.prefix, joined)
            } else {
                format!("{}/{}", split.prefix, joined)
            }
        }
    }
}

/// Derive the default URL for a dependency that declares neither `url` nor
/// `remote`: a sibling of the containing project on the same server.
pub fn default_url(name: &str, containing_url: &str) -> String {
    join(containing_url, &format!("../{}", name))
}

/// Normalize a workspace-relative path: forward slashes, no `.` segments.
pub fn normalize_rel_path(path: &str) -> String {
    let mut stack: Vec<String> = Vec::new();
    apply_segments(&mut stack, &path.replace('\\', "/"), false);
    stack.join("/")
}
