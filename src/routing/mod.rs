//! Routing of authenticated hooks to downstream functions.
//!
//! The routing key is the payload's `repository.name`. The payload is decoded
//! only far enough to reach that field; everything else is forwarded untouched.
//!
//! Two policies govern the edges:
//!
//! - [`PayloadPolicy`] decides what happens when the payload has no usable
//!   `repository.name`. Permissive (the default) routes with an empty key.
//! - [`UnmappedRoute`] decides what happens when the key has no mapping.
//!   `Forward` (the default) produces an empty function name, so the request
//!   goes to the bare endpoint base and usually fails downstream.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::types::{FunctionName, RepoName};

/// Errors produced by the router. Only reachable under the strict policies.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The payload has no string `repository.name`.
    #[error("payload has no repository.name")]
    MissingRepositoryName,

    /// The repository has no configured function.
    #[error("no function mapped for repository {0:?}")]
    UnknownRoute(RepoName),
}

/// How strictly the payload is decoded for its routing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadPolicy {
    /// Missing or malformed fields become an empty key.
    #[default]
    Permissive,

    /// Missing or malformed fields are an error.
    Strict,
}

/// What to do with a repository that has no mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedRoute {
    /// Forward with an empty function name.
    #[default]
    Forward,

    /// Fail with [`RouteError::UnknownRoute`].
    Reject,
}

/// Both routing policies together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub payload: PayloadPolicy,
    pub unmapped: UnmappedRoute,
}

/// Error for unrecognized policy names in configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown policy {value:?}, expected one of: {expected}")]
pub struct InvalidPolicy {
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for PayloadPolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(PayloadPolicy::Permissive),
            "strict" => Ok(PayloadPolicy::Strict),
            _ => Err(InvalidPolicy {
                value: s.to_string(),
                expected: "permissive, strict",
            }),
        }
    }
}

impl FromStr for UnmappedRoute {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(UnmappedRoute::Forward),
            "reject" => Ok(UnmappedRoute::Reject),
            _ => Err(InvalidPolicy {
                value: s.to_string(),
                expected: "forward, reject",
            }),
        }
    }
}

/// Maps a repository name to a function name.
pub trait RouteLookup {
    fn lookup(&self, repository: &RepoName) -> Option<FunctionName>;
}

impl RouteLookup for HashMap<String, String> {
    fn lookup(&self, repository: &RepoName) -> Option<FunctionName> {
        self.get(repository.as_str()).map(|f| FunctionName::new(f.as_str()))
    }
}

/// The process-wide routing table, built once from configuration.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<RepoName, FunctionName>,
}

/// Error for a malformed `repo=function` entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid route entry {0:?}, expected repo=function")]
pub struct InvalidRouteEntry(pub String);

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping, replacing any earlier one for the same repository.
    pub fn with_route(mut self, repository: impl Into<String>, function: impl Into<String>) -> Self {
        self.insert(repository, function);
        self
    }

    pub fn insert(&mut self, repository: impl Into<String>, function: impl Into<String>) {
        self.routes
            .insert(RepoName::new(repository), FunctionName::new(function));
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Parses a comma-separated list of `repo=function` pairs.
    ///
    /// Whitespace around entries is ignored, as are empty entries. The
    /// function may be empty (`repo=`), which routes to the bare endpoint.
    ///
    /// ```
    /// use webhook_relay::routing::{RouteLookup, RouteTable};
    /// use webhook_relay::types::RepoName;
    ///
    /// let table = RouteTable::parse("api=deploy-api, web=deploy-web").unwrap();
    /// assert_eq!(table.lookup(&RepoName::from("web")).unwrap().as_str(), "deploy-web");
    /// ```
    pub fn parse(spec: &str) -> Result<Self, InvalidRouteEntry> {
        let mut table = RouteTable::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (repo, function) = entry
                .split_once('=')
                .ok_or_else(|| InvalidRouteEntry(entry.to_string()))?;
            let repo = repo.trim();
            if repo.is_empty() {
                return Err(InvalidRouteEntry(entry.to_string()));
            }
            table.insert(repo, function.trim());
        }
        Ok(table)
    }
}

impl RouteLookup for RouteTable {
    fn lookup(&self, repository: &RepoName) -> Option<FunctionName> {
        self.routes.get(repository).cloned()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.routes.iter().collect();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        f.debug_map()
            .entries(entries.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

/// Extracts `repository.name` from a raw payload.
///
/// Under [`PayloadPolicy::Permissive`] a missing or unreadable field yields
/// an empty name, and a non-string scalar is rendered as its JSON text.
pub fn extract_repository_name(
    payload: &[u8],
    policy: PayloadPolicy,
) -> Result<RepoName, RouteError> {
    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            return match policy {
                PayloadPolicy::Permissive => Ok(RepoName::new("")),
                PayloadPolicy::Strict => Err(RouteError::InvalidPayload(e)),
            };
        }
    };

    let name = value.get("repository").and_then(|r| r.get("name"));

    match (name, policy) {
        (Some(Value::String(s)), _) => Ok(RepoName::new(s.as_str())),
        (_, PayloadPolicy::Strict) => Err(RouteError::MissingRepositoryName),
        (Some(Value::Null) | None, PayloadPolicy::Permissive) => Ok(RepoName::new("")),
        (Some(other), PayloadPolicy::Permissive) => Ok(RepoName::new(other.to_string())),
    }
}

/// Resolves the downstream function for a payload.
///
/// # Examples
///
/// ```
/// use webhook_relay::routing::{RoutingPolicy, RouteTable, route};
///
/// let table = RouteTable::new().with_route("test", "test-fn");
/// let function = route(br#"{"repository":{"name":"test"}}"#, &table, RoutingPolicy::default()).unwrap();
/// assert_eq!(function.as_str(), "test-fn");
///
/// // Unmapped repositories forward with an empty function name by default.
/// let function = route(br#"{"repository":{"name":"other"}}"#, &table, RoutingPolicy::default()).unwrap();
/// assert!(function.is_empty());
/// ```
pub fn route<L>(payload: &[u8], lookup: &L, policy: RoutingPolicy) -> Result<FunctionName, RouteError>
where
    L: RouteLookup + ?Sized,
{
    let repository = extract_repository_name(payload, policy.payload)?;

    match (lookup.lookup(&repository), policy.unmapped) {
        (Some(function), _) => Ok(function),
        (None, UnmappedRoute::Forward) => Ok(FunctionName::unmapped()),
        (None, UnmappedRoute::Reject) => Err(RouteError::UnknownRoute(repository)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new()
            .with_route("test", "test")
            .with_route("hello-world", "deploy-hello")
    }

    const STRICT: RoutingPolicy = RoutingPolicy {
        payload: PayloadPolicy::Strict,
        unmapped: UnmappedRoute::Forward,
    };

    const REJECT_UNMAPPED: RoutingPolicy = RoutingPolicy {
        payload: PayloadPolicy::Permissive,
        unmapped: UnmappedRoute::Reject,
    };

    // ─── extract_repository_name ───

    #[test]
    fn extracts_nested_name() {
        let payload = br#"{"action":"opened","repository":{"name":"hello-world","owner":{"login":"octocat"}}}"#;
        let name = extract_repository_name(payload, PayloadPolicy::Strict).unwrap();
        assert_eq!(name.as_str(), "hello-world");
    }

    #[test]
    fn permissive_missing_repository_is_empty() {
        let name = extract_repository_name(br#"{"action":"opened"}"#, PayloadPolicy::Permissive).unwrap();
        assert!(name.is_empty());
    }

    #[test]
    fn permissive_invalid_json_is_empty() {
        let name = extract_repository_name(b"not json", PayloadPolicy::Permissive).unwrap();
        assert!(name.is_empty());
    }

    #[test]
    fn permissive_non_object_is_empty() {
        let name = extract_repository_name(b"[1,2,3]", PayloadPolicy::Permissive).unwrap();
        assert!(name.is_empty());
    }

    #[test]
    fn permissive_numeric_name_is_rendered() {
        let name = extract_repository_name(br#"{"repository":{"name":42}}"#, PayloadPolicy::Permissive).unwrap();
        assert_eq!(name.as_str(), "42");
    }

    #[test]
    fn strict_invalid_json_fails() {
        let result = extract_repository_name(b"{", PayloadPolicy::Strict);
        assert!(matches!(result, Err(RouteError::InvalidPayload(_))));
    }

    #[test]
    fn strict_missing_name_fails() {
        let result = extract_repository_name(br#"{"repository":{}}"#, PayloadPolicy::Strict);
        assert!(matches!(result, Err(RouteError::MissingRepositoryName)));
    }

    #[test]
    fn strict_non_string_name_fails() {
        let result = extract_repository_name(br#"{"repository":{"name":42}}"#, PayloadPolicy::Strict);
        assert!(matches!(result, Err(RouteError::MissingRepositoryName)));
    }

    // ─── route ───

    #[test]
    fn routes_mapped_repository() {
        let function = route(br#"{"repository":{"name":"test"}}"#, &table(), RoutingPolicy::default()).unwrap();
        assert_eq!(function.as_str(), "test");
    }

    #[test]
    fn unmapped_repository_forwards_with_empty_name() {
        let function = route(br#"{"repository":{"name":"nope"}}"#, &table(), RoutingPolicy::default()).unwrap();
        assert!(function.is_empty());
    }

    #[test]
    fn missing_repository_forwards_with_empty_name() {
        let function = route(br#"{}"#, &table(), RoutingPolicy::default()).unwrap();
        assert!(function.is_empty());
    }

    #[test]
    fn unmapped_repository_rejected_when_configured() {
        let result = route(br#"{"repository":{"name":"nope"}}"#, &table(), REJECT_UNMAPPED);
        match result {
            Err(RouteError::UnknownRoute(repo)) => assert_eq!(repo.as_str(), "nope"),
            other => panic!("expected UnknownRoute, got {:?}", other),
        }
    }

    #[test]
    fn strict_policy_propagates_payload_errors() {
        let result = route(b"garbage", &table(), STRICT);
        assert!(matches!(result, Err(RouteError::InvalidPayload(_))));
    }

    #[test]
    fn hashmap_lookup_works() {
        let mut map = HashMap::new();
        map.insert("test".to_string(), "from-map".to_string());

        let function = route(br#"{"repository":{"name":"test"}}"#, &map, RoutingPolicy::default()).unwrap();
        assert_eq!(function.as_str(), "from-map");
    }

    // ─── RouteTable::parse ───

    #[test]
    fn parse_route_table() {
        let table = RouteTable::parse(" api = deploy-api ,web=deploy-web,, ").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(&RepoName::from("api")), Some(FunctionName::from("deploy-api")));
        assert_eq!(table.lookup(&RepoName::from("web")), Some(FunctionName::from("deploy-web")));
    }

    #[test]
    fn parse_empty_route_table() {
        assert!(RouteTable::parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_route_with_empty_function() {
        let table = RouteTable::parse("api=").unwrap();
        assert_eq!(table.lookup(&RepoName::from("api")), Some(FunctionName::unmapped()));
    }

    #[test]
    fn parse_rejects_entry_without_separator() {
        assert_eq!(
            RouteTable::parse("api"),
            Err(InvalidRouteEntry("api".to_string()))
        );
    }

    #[test]
    fn parse_rejects_empty_repository() {
        assert!(RouteTable::parse("=fn").is_err());
    }

    // ─── policy parsing ───

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!("Strict".parse::<PayloadPolicy>(), Ok(PayloadPolicy::Strict));
        assert_eq!("permissive".parse::<PayloadPolicy>(), Ok(PayloadPolicy::Permissive));
        assert_eq!("REJECT".parse::<UnmappedRoute>(), Ok(UnmappedRoute::Reject));
        assert_eq!(" forward ".parse::<UnmappedRoute>(), Ok(UnmappedRoute::Forward));
        assert!("lenient".parse::<PayloadPolicy>().is_err());
    }
}
