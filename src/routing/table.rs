//! Prefix lookup.
//!
//! # Responsibilities
//! - Store registered prefixes
//! - Resolve a request to the longest structurally matching prefix
//! - Split the decoded path into PathBase and Path
//!
//! # Design Decisions
//! - Copy-on-write set behind `ArcSwap`: readers load a snapshot without
//!   locking and never see a half-applied add/remove
//! - Longest match counts path segments, not characters
//! - O(n) scan over the snapshot (prefix sets are small)
//! - Explicit `NoMatch` rather than a silent default

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::RouteError;
use crate::routing::codec::DecodedPath;
use crate::routing::prefix::{normalize_host, Scheme, UrlPrefix};

/// What the transport knows about where a request was sent.
#[derive(Debug, Clone, Copy)]
pub struct RequestTarget<'a> {
    pub scheme: Scheme,
    /// Host without port, as sent by the client.
    pub host: &'a str,
    /// Local port the request arrived on.
    pub port: u16,
    /// Raw absolute path, query already removed.
    pub raw_path: &'a str,
}

/// A matched prefix and the decoded PathBase/Path split.
///
/// `path_base + path` is always the full decoded request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub prefix: UrlPrefix,
    pub path_base: String,
    pub path: String,
}

/// The set of registered prefixes.
#[derive(Debug, Default)]
pub struct PrefixTable {
    prefixes: ArcSwap<BTreeSet<UrlPrefix>>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefix. Returns `false` if it was already present.
    pub fn add(&self, prefix: UrlPrefix) -> bool {
        let previous = self.prefixes.rcu(|current| {
            let mut next = BTreeSet::clone(current);
            next.insert(prefix.clone());
            next
        });
        let added = !previous.contains(&prefix);
        if added {
            tracing::debug!(prefix = %prefix, "Prefix registered");
        }
        added
    }

    /// Unregister a prefix. Returns `false` if it was not present.
    pub fn remove(&self, prefix: &UrlPrefix) -> bool {
        let previous = self.prefixes.rcu(|current| {
            let mut next = BTreeSet::clone(current);
            next.remove(prefix);
            next
        });
        let removed = previous.contains(prefix);
        if removed {
            tracing::debug!(prefix = %prefix, "Prefix unregistered");
        }
        removed
    }

    pub fn contains(&self, prefix: &UrlPrefix) -> bool {
        self.prefixes.load().contains(prefix)
    }

    pub fn len(&self) -> usize {
        self.prefixes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.load().is_empty()
    }

    /// A consistent copy of the current set.
    pub fn snapshot(&self) -> Arc<BTreeSet<UrlPrefix>> {
        self.prefixes.load_full()
    }

    /// Find the longest registered prefix for the request.
    pub fn resolve(&self, target: &RequestTarget<'_>) -> Result<Resolution, RouteError> {
        if !target.raw_path.starts_with('/') {
            return Err(self.no_match(target));
        }

        let path = DecodedPath::parse(target.raw_path)?;
        let host = normalize_host(target.host);
        let prefixes = self.prefixes.load();

        let best = prefixes
            .iter()
            .filter(|prefix| prefix.matches(target.scheme, &host, target.port, &path))
            .max_by_key(|prefix| (prefix.segments().len(), prefix.host().precedence()))
            .ok_or_else(|| self.no_match(target))?;

        Ok(Resolution {
            prefix: best.clone(),
            path_base: best.path_base().to_string(),
            path: path.tail(best.segments().len()),
        })
    }

    fn no_match(&self, target: &RequestTarget<'_>) -> RouteError {
        RouteError::NoMatch {
            host: target.host.to_string(),
            port: target.port,
            path: target.raw_path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn table(paths: &[&str]) -> PrefixTable {
        let table = PrefixTable::new();
        for path in paths {
            table.add(UrlPrefix::new(Scheme::Http, "+", 8080, path).unwrap());
        }
        table
    }

    fn target(raw_path: &str) -> RequestTarget<'_> {
        RequestTarget {
            scheme: Scheme::Http,
            host: "localhost",
            port: 8080,
            raw_path,
        }
    }

    fn split(table: &PrefixTable, raw_path: &str) -> (String, String) {
        let resolution = table.resolve(&target(raw_path)).unwrap();
        (resolution.path_base, resolution.path)
    }

    #[test]
    fn multiple_overlapping_prefixes() {
        let table = table(&["/", "/11", "/2/3", "/2", "/11/2"]);
        let cases = [
            ("/", "", "/"),
            ("/random", "", "/random"),
            ("/11", "/11", ""),
            ("/11/", "/11", "/"),
            ("/11/random", "/11", "/random"),
            ("/2", "/2", ""),
            ("/2/", "/2", "/"),
            ("/2/random", "/2", "/random"),
            ("/2/3", "/2/3", ""),
            ("/2/3/", "/2/3", "/"),
            ("/2/3/random", "/2/3", "/random"),
            ("/11/2/x", "/11/2", "/x"),
            ("/200", "", "/200"),
        ];

        for (request, base, path) in cases {
            assert_eq!(split(&table, request), (base.to_string(), path.to_string()), "request {request}");
        }
    }

    #[test]
    fn path_splitting() {
        let cases = [
            ("/", "/", "", "/"),
            ("/basepath/", "/basepath", "/basepath", ""),
            ("/basepath/", "/basepath/", "/basepath", "/"),
            ("/basepath/", "/basepath/subpath", "/basepath", "/subpath"),
            ("/base path/", "/base%20path/sub path", "/base path", "/sub path"),
            ("/base葉path/", "/base%E8%91%89path/sub%E8%91%89path", "/base葉path", "/sub葉path"),
        ];

        for (prefix, request, base, path) in cases {
            let table = table(&[prefix]);
            assert_eq!(split(&table, request), (base.to_string(), path.to_string()), "prefix {prefix} request {request}");
        }
    }

    #[test]
    fn path_base_plus_path_is_decoded_path() {
        let table = table(&["/", "/a", "/a/b%20c", "/x/y/z"]);
        for raw in ["/", "/a", "/a/", "/a/b%20c/d", "/x/y", "/x/y/z/%E8%91%89", "/q//r"] {
            let resolution = table.resolve(&target(raw)).unwrap();
            let decoded = DecodedPath::parse(raw).unwrap().to_string();
            assert_eq!(format!("{}{}", resolution.path_base, resolution.path), decoded);
        }
    }

    #[test]
    fn no_match_without_root() {
        let table = table(&["/api"]);
        assert!(matches!(table.resolve(&target("/other")), Err(RouteError::NoMatch { .. })));
        assert!(matches!(table.resolve(&target("/apis")), Err(RouteError::NoMatch { .. })));
        assert!(matches!(table.resolve(&target("*")), Err(RouteError::NoMatch { .. })));
    }

    #[test]
    fn no_match_on_wrong_port_or_scheme() {
        let table = table(&["/"]);
        let mut t = target("/");
        t.port = 9090;
        assert!(table.resolve(&t).is_err());

        let mut t = target("/");
        t.scheme = Scheme::Https;
        assert!(table.resolve(&t).is_err());
    }

    #[test]
    fn encoding_error_is_reported() {
        let table = table(&["/"]);
        assert!(matches!(table.resolve(&target("/bad%FF")), Err(RouteError::Encoding(_))));
    }

    #[test]
    fn encoded_slash_stays_inside_segment() {
        let table = table(&["/", "/a/b"]);
        let resolution = table.resolve(&target("/a%2Fb/c")).unwrap();
        assert_eq!(resolution.path_base, "");
        assert_eq!(resolution.path, "/a/b/c");
    }

    #[test]
    fn host_precedence_breaks_segment_ties() {
        let table = PrefixTable::new();
        let weak = UrlPrefix::parse("http://*:8080/app").unwrap();
        let explicit = UrlPrefix::parse("http://localhost:8080/app").unwrap();
        let strong = UrlPrefix::parse("http://+:8080/app").unwrap();
        let longer_weak = UrlPrefix::parse("http://*:8080/app/deep").unwrap();
        table.add(weak.clone());
        table.add(explicit.clone());

        assert_eq!(table.resolve(&target("/app/x")).unwrap().prefix, explicit);

        let mut other_host = target("/app/x");
        other_host.host = "example.org";
        assert_eq!(table.resolve(&other_host).unwrap().prefix, weak);

        table.add(strong.clone());
        assert_eq!(table.resolve(&target("/app/x")).unwrap().prefix, strong);

        table.add(longer_weak.clone());
        assert_eq!(table.resolve(&target("/app/deep/x")).unwrap().prefix, longer_weak);
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let table = table(&["/", "/a"]);
        let before = table.snapshot();
        let prefix = UrlPrefix::parse("http://+:8080/b").unwrap();

        assert!(table.add(prefix.clone()));
        assert!(!table.add(prefix.clone()));
        assert_eq!(table.len(), 3);

        assert!(table.remove(&prefix));
        assert!(!table.remove(&prefix));
        assert_eq!(*table.snapshot(), *before);
    }

    #[test]
    fn concurrent_resolve_during_mutation() {
        let table = Arc::new(table(&["/", "/stable"]));
        let churn = UrlPrefix::parse("http://+:8080/stable/churn").unwrap();

        let writer = {
            let table = Arc::clone(&table);
            let churn = churn.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    table.add(churn.clone());
                    table.remove(&churn);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let resolution = table.resolve(&target("/stable/churn/leaf")).unwrap();
                        let split = (resolution.path_base.as_str(), resolution.path.as_str());
                        assert!(
                            split == ("/stable", "/churn/leaf") || split == ("/stable/churn", "/leaf"),
                            "torn resolution {split:?}"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(!table.contains(&churn));
    }
}
