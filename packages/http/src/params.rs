//! Query-string helpers for endpoint paths.

/// Append URL-encoded query parameters to `path`.
///
/// Pairs whose value is `None` are skipped, so optional filters can be
/// passed straight through.
///
/// ```rust
/// use otadash_http::with_params;
///
/// let path = with_params("/dashboard/update-logs", [("app_id", Some("com.acme")), ("device_id", None)]);
/// assert_eq!(path, "/dashboard/update-logs?app_id=com.acme");
/// ```
pub fn with_params<'a, I, V>(path: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<V>)>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (name, value) in params {
        if let Some(value) = value {
            serializer.append_pair(name, value.as_ref());
            any = true;
        }
    }

    if !any {
        return path.to_string();
    }

    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, serializer.finish())
}
