use reqwest::Url;

use crate::core::HttpClientError;

/// Reject request targets that carry their own scheme, host or absolute path.
///
/// The balancer supplies scheme, host, port and any announced path prefix, so
/// the caller's target has to be a relative path.
pub fn validate_relative(uri: &str) -> Result<(), HttpClientError> {
    if Url::parse(uri).is_ok() {
        return Err(HttpClientError::invalid_request(uri, "is not a relative URI"));
    }
    if uri.starts_with("//") {
        return Err(HttpClientError::invalid_request(uri, "has a host component"));
    }
    if uri.starts_with('/') {
        return Err(HttpClientError::invalid_request(uri, "path starts with '/'"));
    }
    Ok(())
}

/// Panicking form of [`validate_relative`] for the balancing clients, where a
/// non-relative target is a caller bug rather than a request failure.
///
/// # Panics
///
/// Panics with the validation message when `uri` is not a relative target.
pub fn require_relative(uri: &str) {
    if let Err(err) = validate_relative(uri) {
        panic!("{err}");
    }
}

/// Resolve a relative target beneath an endpoint's base URI
pub fn resolve(base: &Url, relative: &str) -> Result<Url, HttpClientError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(relative)
        .map_err(|err| HttpClientError::invalid_request(relative, &err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_relative_targets_accepted() {
        assert!(validate_relative("v1/service").is_ok());
        assert!(validate_relative("").is_ok());
        assert!(validate_relative("v1/service?q=1").is_ok());
    }

    #[test]
    fn test_scheme_rejected() {
        let err = validate_relative("http:/v1/service").unwrap_err();
        assert!(err.to_string().ends_with("is not a relative URI"));
    }

    #[test]
    fn test_host_rejected() {
        let err = validate_relative("//example.com/v1/service").unwrap_err();
        assert!(err.to_string().ends_with("has a host component"));
    }

    #[test]
    fn test_absolute_path_rejected() {
        let err = validate_relative("/v1/service").unwrap_err();
        assert!(err.to_string().ends_with("path starts with '/'"));
    }

    #[test]
    fn test_resolve_with_and_without_trailing_slash() {
        assert_eq!(
            resolve(&url("http://s1.example.com"), "v1/service").unwrap(),
            url("http://s1.example.com/v1/service")
        );
        assert_eq!(
            resolve(&url("http://s2.example.com/"), "v1/service").unwrap(),
            url("http://s2.example.com/v1/service")
        );
    }

    #[test]
    fn test_resolve_under_announced_prefix() {
        assert_eq!(
            resolve(&url("http://s3.example.com/prefix"), "v1/service").unwrap(),
            url("http://s3.example.com/prefix/v1/service")
        );
    }

    #[test]
    fn test_resolve_empty_path() {
        assert_eq!(
            resolve(&url("http://s1.example.com"), "").unwrap().as_str(),
            "http://s1.example.com/"
        );
    }
}
