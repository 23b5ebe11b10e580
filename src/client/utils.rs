//! Small string helpers shared by the builders.
//!
//! This module provides helper functions for:
//! - Joining a base path and a request path
//! - Substituting `{name}` path placeholders
//! - Formatting typed values for paths, queries, and form fields
//! - Quoting multipart parameter values

/// Join a base path and a request path with exactly one `/` between them.
///
/// An empty (or `/`-only) request path leaves the base untouched.
///
/// # Examples
///
/// ```
/// use streamline_http::client::join_path;
///
/// assert_eq!(join_path("/api", "/users"), "/api/users");
/// assert_eq!(join_path("/api/", "users"), "/api/users");
/// assert_eq!(join_path("/api", ""), "/api");
/// assert_eq!(join_path("/", "/test"), "/test");
/// ```
pub fn join_path(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Replace every `{key}` placeholder in `template` with `value`.
///
/// # Examples
///
/// ```
/// use streamline_http::client::substitute_placeholder;
///
/// let path = substitute_placeholder("/x/{p}/y/{p}", "p", "7");
/// assert_eq!(path, "/x/7/y/7");
/// ```
pub fn substitute_placeholder(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}

/// Shortest round-trippable decimal form of a float, never in exponent form.
///
/// # Examples
///
/// ```
/// use streamline_http::client::format_float;
///
/// assert_eq!(format_float(19.99), "19.99");
/// assert_eq!(format_float(3.0), "3");
/// assert_eq!(format_float(1e21), "1000000000000000000000");
/// ```
pub fn format_float(value: f64) -> String {
    value.to_string()
}

/// Escape `\` and `"` for a quoted multipart parameter value.
pub fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
