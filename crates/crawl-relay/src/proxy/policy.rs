//! Header policy: the allow-list controlling which headers reach the
//! upstream target and how their values are computed.
//!
//! Each rule maps a header name to a literal value, a derivation function of
//! the inbound relay request, or pass-through (inherit the inbound value).
//! Headers without a rule are never forwarded.

use std::fmt;
use std::sync::Arc;

use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri};

use crate::error::{Error, Result};

/// View of an inbound relay request handed to derivation functions.
pub struct ForwardedRequest<'a> {
    /// The fully-qualified URL the relay is about to fetch.
    pub target_url: &'a str,
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
}

/// Derivation function computing a header value from the inbound request.
pub type HeaderFn = Arc<dyn Fn(&ForwardedRequest<'_>) -> String + Send + Sync>;

/// One header rule.
#[derive(Clone)]
pub enum HeaderRule {
    /// Emit this static value.
    Literal(String),
    /// Invoke the function with the inbound request and emit the result.
    Derived(HeaderFn),
    /// Copy every value the inbound request carries for this header, or
    /// omit the header entirely when the inbound request lacks it.
    PassThrough,
    /// A malformed configured value. Kept until resolution so the type
    /// error surfaces when headers are resolved, not when the rule is
    /// registered.
    Invalid(String),
}

impl HeaderRule {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&ForwardedRequest<'_>) -> String + Send + Sync + 'static,
    {
        HeaderRule::Derived(Arc::new(f))
    }

    /// Interpret a configured YAML value: a string is a literal, null is
    /// pass-through, anything else is invalid.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::String(s) => HeaderRule::Literal(s.clone()),
            serde_yaml::Value::Null => HeaderRule::PassThrough,
            serde_yaml::Value::Bool(_) => HeaderRule::Invalid("bool".to_string()),
            serde_yaml::Value::Number(_) => HeaderRule::Invalid("number".to_string()),
            serde_yaml::Value::Sequence(_) => HeaderRule::Invalid("sequence".to_string()),
            serde_yaml::Value::Mapping(_) => HeaderRule::Invalid("mapping".to_string()),
            serde_yaml::Value::Tagged(_) => HeaderRule::Invalid("tagged".to_string()),
        }
    }
}

impl fmt::Debug for HeaderRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderRule::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            HeaderRule::Derived(_) => f.write_str("Derived(..)"),
            HeaderRule::PassThrough => f.write_str("PassThrough"),
            HeaderRule::Invalid(kind) => f.debug_tuple("Invalid").field(kind).finish(),
        }
    }
}

/// Ordered, case-insensitive mapping from header name to rule.
///
/// Registration order is resolution order; re-registering a name keeps its
/// position and replaces its rule.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    rules: Vec<(String, HeaderRule)>,
}

impl HeaderPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default rules: `Host` derived from the target URL's hostname,
    /// `Content-Type` pinned to `text/html`, `User-Agent` inherited from
    /// the inbound request.
    pub fn with_defaults() -> Self {
        let mut policy = Self::new();
        policy.insert(
            "Host",
            HeaderRule::derived(|req| {
                req.target_url
                    .parse::<Uri>()
                    .ok()
                    .and_then(|uri| uri.host().map(str::to_string))
                    .unwrap_or_default()
            }),
        );
        policy.insert("Content-Type", HeaderRule::Literal("text/html".to_string()));
        policy.insert("User-Agent", HeaderRule::PassThrough);
        policy
    }

    /// Register a rule. Names are case-insensitive; the last registration
    /// for a name wins.
    pub fn insert(&mut self, name: impl Into<String>, rule: HeaderRule) {
        let name = name.into();
        if let Some(existing) = self
            .rules
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            existing.1 = rule;
        } else {
            self.rules.push((name, rule));
        }
    }

    /// Merge a batch of rules into the policy.
    pub fn extend<I>(&mut self, rules: I)
    where
        I: IntoIterator<Item = (String, HeaderRule)>,
    {
        for (name, rule) in rules {
            self.insert(name, rule);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compute the outbound header set for a forwarded request.
    ///
    /// Strict allow-list: only headers with a rule are considered, in
    /// registration order. Multi-valued inbound headers are relayed in full
    /// by pass-through rules.
    pub fn resolve(&self, inbound: &ForwardedRequest<'_>) -> Result<HeaderMap> {
        let mut outbound = HeaderMap::new();
        for (name, rule) in &self.rules {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeaderName(name.clone()))?;
            match rule {
                HeaderRule::Literal(value) => {
                    let value = HeaderValue::from_str(value)
                        .map_err(|_| Error::InvalidHeaderValue(name.clone()))?;
                    outbound.append(header_name, value);
                }
                HeaderRule::Derived(derive) => {
                    let value = derive(inbound);
                    let value = HeaderValue::from_str(&value)
                        .map_err(|_| Error::InvalidHeaderValue(name.clone()))?;
                    outbound.append(header_name, value);
                }
                HeaderRule::PassThrough => {
                    for value in inbound.headers.get_all(&header_name) {
                        outbound.append(header_name.clone(), value.clone());
                    }
                }
                HeaderRule::Invalid(kind) => {
                    return Err(Error::HeaderRuleType {
                        name: name.clone(),
                        kind: kind.clone(),
                    });
                }
            }
        }
        Ok(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound<'a>(target_url: &'a str, headers: &'a HeaderMap) -> ForwardedRequest<'a> {
        ForwardedRequest {
            target_url,
            method: &Method::GET,
            headers,
        }
    }

    #[test]
    fn test_defaults_resolve() {
        let policy = HeaderPolicy::with_defaults();
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "test user agent".parse().unwrap());
        headers.insert("must-delete", "x".parse().unwrap());

        let resolved = policy
            .resolve(&inbound("https://www.python.org/", &headers))
            .unwrap();

        assert_eq!(resolved.get("host").unwrap(), "www.python.org");
        assert_eq!(resolved.get("content-type").unwrap(), "text/html");
        assert_eq!(resolved.get("user-agent").unwrap(), "test user agent");
        // Not in the policy: never forwarded.
        assert!(resolved.get("must-delete").is_none());
    }

    #[test]
    fn test_pass_through_omits_absent_header() {
        let mut policy = HeaderPolicy::new();
        policy.insert("X-Session", HeaderRule::PassThrough);
        let headers = HeaderMap::new();
        let resolved = policy
            .resolve(&inbound("https://example.org/", &headers))
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_pass_through_preserves_all_values() {
        let mut policy = HeaderPolicy::new();
        policy.insert("X-Multi", HeaderRule::PassThrough);
        let mut headers = HeaderMap::new();
        headers.append("x-multi", "one".parse().unwrap());
        headers.append("x-multi", "two".parse().unwrap());

        let resolved = policy
            .resolve(&inbound("https://example.org/", &headers))
            .unwrap();
        let values: Vec<_> = resolved
            .get_all("x-multi")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn test_derived_value_matches_function() {
        let mut policy = HeaderPolicy::new();
        policy.insert(
            "X-Method",
            HeaderRule::derived(|req| req.method.as_str().to_lowercase()),
        );
        let headers = HeaderMap::new();
        let resolved = policy
            .resolve(&inbound("https://example.org/", &headers))
            .unwrap();
        assert_eq!(resolved.get("x-method").unwrap(), "get");
    }

    #[test]
    fn test_invalid_rule_errors_at_resolution() {
        let mut policy = HeaderPolicy::new();
        policy.insert(
            "X-Bad",
            HeaderRule::from_yaml(&serde_yaml::Value::Sequence(vec![])),
        );
        // Registration itself is fine.
        assert!(policy.contains("x-bad"));

        let headers = HeaderMap::new();
        let err = policy
            .resolve(&inbound("https://example.org/", &headers))
            .unwrap_err();
        assert!(matches!(err, Error::HeaderRuleType { .. }));
    }

    #[test]
    fn test_last_registration_wins_case_insensitively() {
        let mut policy = HeaderPolicy::new();
        policy.insert("x-custom", HeaderRule::Literal("first".to_string()));
        policy.insert("X-Custom", HeaderRule::Literal("second".to_string()));
        assert_eq!(policy.len(), 1);

        let headers = HeaderMap::new();
        let resolved = policy
            .resolve(&inbound("https://example.org/", &headers))
            .unwrap();
        assert_eq!(resolved.get("x-custom").unwrap(), "second");
    }

    #[test]
    fn test_rule_from_yaml() {
        assert!(matches!(
            HeaderRule::from_yaml(&serde_yaml::Value::String("v".to_string())),
            HeaderRule::Literal(_)
        ));
        assert!(matches!(
            HeaderRule::from_yaml(&serde_yaml::Value::Null),
            HeaderRule::PassThrough
        ));
        assert!(matches!(
            HeaderRule::from_yaml(&serde_yaml::Value::Bool(true)),
            HeaderRule::Invalid(_)
        ));
    }

    #[test]
    fn test_extend_merges_rules() {
        let mut policy = HeaderPolicy::with_defaults();
        assert!(!policy.contains("x-extra"));
        policy.extend(vec![(
            "X-Extra".to_string(),
            HeaderRule::Literal("1".to_string()),
        )]);
        assert!(policy.contains("x-extra"));
    }
}
