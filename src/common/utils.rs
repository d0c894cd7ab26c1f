//! Path and retry utilities for coordkv

use std::time::Duration;

/// Maximum accepted path length in bytes
const MAX_PATH_LEN: usize = 1024;

/// Validate a node path.
///
/// Paths are absolute, slash-delimited, with no trailing slash, no empty
/// segments, and no control characters. The root `/` itself is not an
/// addressable node.
pub fn validate_path(path: &str) -> crate::Result<()> {
    if path.is_empty() {
        return Err(crate::Error::InvalidPath("path cannot be empty".into()));
    }

    if !path.starts_with('/') {
        return Err(crate::Error::InvalidPath(format!(
            "path must be absolute: {}",
            path
        )));
    }

    if path == "/" {
        return Err(crate::Error::InvalidPath(
            "the root itself is not a node".into(),
        ));
    }

    if path.ends_with('/') {
        return Err(crate::Error::InvalidPath(format!(
            "path cannot end with '/': {}",
            path
        )));
    }

    if path.len() > MAX_PATH_LEN {
        return Err(crate::Error::InvalidPath(format!(
            "path too long (max {} bytes)",
            MAX_PATH_LEN
        )));
    }

    if path.contains("//") {
        return Err(crate::Error::InvalidPath(format!(
            "path cannot contain empty segments: {}",
            path
        )));
    }

    if path.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidPath(
            "path contains control characters".into(),
        ));
    }

    Ok(())
}

/// Enumerate the ancestors of a path, shallowest first.
///
/// `/a/b/c` yields `["/a", "/a/b"]`; a top-level path yields nothing.
pub fn parent_paths(path: &str) -> Vec<String> {
    let mut parents = Vec::new();

    // Skip the leading slash, then cut at every inner slash
    for (i, c) in path.char_indices().skip(1) {
        if c == '/' {
            parents.push(path[..i].to_string());
        }
    }

    parents
}

/// Return the immediate-child name iff `key` is exactly one level under
/// `parent`.
///
/// Deeper descendants and the parent itself yield `None`; used by the
/// children listing and the children-watch filter.
pub fn child_name<'a>(parent: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(parent)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

/// Exponential-backoff retry policy applied around delegated calls.
///
/// Defaults reproduce the policy the connection is configured with:
/// 1000 ms base delay, 6 attempts, 10 s cap per attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_retries: usize,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_retries: 6,
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given zero-based retry attempt, doubled each time
    /// and capped at `max_delay`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `f`, retrying on retryable errors with exponential backoff.
    ///
    /// Logical failures propagate immediately; the last error is returned
    /// once the retry budget is exhausted.
    pub async fn run<F, Fut, T>(&self, what: &str, mut f: F) -> crate::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = crate::Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} attempt {} failed: {}, retrying in {:?}",
                        what,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/a").is_ok());
        assert!(validate_path("/registry/dictionary/a").is_ok());

        assert!(validate_path("").is_err());
        assert!(validate_path("/").is_err());
        assert!(validate_path("relative/path").is_err());
        assert!(validate_path("/trailing/").is_err());
        assert!(validate_path("/double//slash").is_err());
        assert!(validate_path("/ctrl\u{7}char").is_err());
        assert!(validate_path(&format!("/{}", "x".repeat(2000))).is_err());
    }

    #[test]
    fn test_parent_paths() {
        assert_eq!(parent_paths("/a"), Vec::<String>::new());
        assert_eq!(parent_paths("/a/b"), vec!["/a"]);
        assert_eq!(parent_paths("/a/b/c"), vec!["/a", "/a/b"]);
        assert_eq!(
            parent_paths("/registry/dictionary/a"),
            vec!["/registry", "/registry/dictionary"]
        );
    }

    #[test]
    fn test_child_name() {
        assert_eq!(child_name("/a", "/a/b"), Some("b"));
        assert_eq!(child_name("/a", "/a/b/c"), None);
        assert_eq!(child_name("/a", "/a"), None);
        assert_eq!(child_name("/a", "/ab"), None);
        assert_eq!(child_name("/a", "/other"), None);
    }

    #[test]
    fn test_retry_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        // capped from here on
        assert_eq!(policy.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_logical_errors() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result: crate::Result<()> = policy
            .run("test", || {
                calls += 1;
                async { Err(crate::Error::NodeNotFound("/a".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_retries_transient_errors() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_retries: 3,
            max_delay: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result = policy
            .run("test", || {
                calls += 1;
                let ok = calls > 2;
                async move {
                    if ok {
                        Ok(42)
                    } else {
                        Err(crate::Error::Timeout("transient".into()))
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }
}
