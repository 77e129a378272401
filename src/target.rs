//! Label-selector queries against the pods API.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters that may not appear verbatim in a URL query component.
const QUERY_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped in a path segment, so a namespace cannot change the route.
const PATH_SEGMENT: &AsciiSet = &QUERY_UNSAFE.add(b'/').add(b'?');

/// Describes which pods to discover: a label selector within a namespace.
///
/// Labels are kept in a sorted map, so equal targets always render the same path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    labels: BTreeMap<String, String>,
    namespace: String,
}

impl Target {
    /// Namespace used when none is given.
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Creates a target selecting pods that carry every given label, in the default namespace.
    #[must_use]
    pub fn new<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Sets the namespace to search.
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The label selector as a key/value map.
    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// The namespace to search.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Request path listing the pods matched by this target.
    #[must_use]
    pub fn path(&self) -> String {
        self.render_path(false)
    }

    /// Request path streaming changes to the pods matched by this target.
    #[must_use]
    pub fn watch_path(&self) -> String {
        self.render_path(true)
    }

    fn render_path(&self, watch: bool) -> String {
        let mut path = format!(
            "/api/v1/namespaces/{}/pods?labelSelector={}",
            utf8_percent_encode(&self.namespace, PATH_SEGMENT),
            utf8_percent_encode(&self.encoded_selector(), NON_ALPHANUMERIC)
        );

        if watch {
            path.push_str("&watch=true");
        }

        path
    }

    // Keys and values are escaped for the query first; the assembled selector
    // is then escaped as a whole so `=` and `,` survive as a single parameter.
    fn encoded_selector(&self) -> String {
        self.labels
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_UNSAFE),
                    utf8_percent_encode(value, QUERY_UNSAFE)
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.namespace)?;

        for (i, (key, value)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }

            write!(f, "{key}={value}")?;
        }

        Ok(())
    }
}
