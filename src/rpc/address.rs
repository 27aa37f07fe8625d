//! Hierarchical addresses and wildcard patterns.
//!
//! An [`Address`] is a concrete path of string segments naming a handler
//! (`["net", "x", "hello"]`). A [`Pattern`] is what handlers and policies are
//! registered under: literal segments plus `*` wildcards that match any one
//! segment.
//!
//! The `_` namespace is reserved for protocol traffic:
//!
//! ```text
//!   _/ret/id<N>             reply correlation address for request N
//!   _/close                 close notice
//!   _/keepalive             heartbeat
//!   _/stopgen/_/ret/id<N>   stop listener for the stream replying to id<N>
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Leading segment of every protocol-internal address.
pub const RESERVED_NAMESPACE: &str = "_";

/// Textual form of the wildcard segment in [`Pattern::parse`].
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Vec<String>);

impl Address {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a `/`-separated path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new address with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(segment.into());
        next
    }

    /// A new address with all of `other`'s segments appended.
    pub fn join(&self, other: &Address) -> Self {
        let mut next = self.clone();
        next.0.extend(other.0.iter().cloned());
        next
    }

    pub fn is_reserved(&self) -> bool {
        self.0.first().is_some_and(|s| s == RESERVED_NAMESPACE)
    }

    // ── Reserved addresses ─────────────────────────────────────

    /// `_/ret/id<n>`
    pub fn correlation(n: u64) -> Self {
        Self::new([RESERVED_NAMESPACE.to_owned(), "ret".to_owned(), format!("id{n}")])
    }

    /// `_/close`
    pub fn close_notice() -> Self {
        Self::new([RESERVED_NAMESPACE, "close"])
    }

    /// `_/keepalive`
    pub fn keepalive() -> Self {
        Self::new([RESERVED_NAMESPACE, "keepalive"])
    }

    /// `_/stopgen` followed by the stream's correlation address.
    pub fn stop_stream(correlation: &Address) -> Self {
        Self::new([RESERVED_NAMESPACE, "stopgen"]).join(correlation)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<const N: usize> From<[&str; N]> for Address {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl From<&[&str]> for Address {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl From<Vec<String>> for Address {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&Address> for Address {
    fn from(address: &Address) -> Self {
        address.clone()
    }
}

// ── Patterns ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    /// Matches exactly one segment of any value.
    Any,
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pattern(Vec<Segment>);

impl Pattern {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a `/`-separated pattern; `*` segments become wildcards.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if s == WILDCARD {
                        Segment::Any
                    } else {
                        Segment::Literal(s.to_owned())
                    }
                })
                .collect(),
        )
    }

    /// The empty pattern: the root of a map.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a literal segment.
    pub fn then(mut self, segment: impl Into<String>) -> Self {
        self.0.push(Segment::Literal(segment.into()));
        self
    }

    /// Append a wildcard segment.
    pub fn then_any(mut self) -> Self {
        self.0.push(Segment::Any);
        self
    }

    /// `true` when the pattern has no wildcards and spells out `address`.
    pub fn is_exactly(&self, address: &Address) -> bool {
        self.0.len() == address.len()
            && self.0.iter().zip(address.segments()).all(|(seg, s)| match seg {
                Segment::Literal(l) => l == s,
                Segment::Any => false,
            })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match seg {
                Segment::Literal(s) => f.write_str(s)?,
                Segment::Any => f.write_str(WILDCARD)?,
            }
        }
        Ok(())
    }
}

/// Addresses are patterns without wildcards.
impl From<Address> for Pattern {
    fn from(address: Address) -> Self {
        Self(address.0.into_iter().map(Segment::Literal).collect())
    }
}

impl From<&Address> for Pattern {
    fn from(address: &Address) -> Self {
        Self::from(address.clone())
    }
}

/// Array literals are taken verbatim: `"*"` here is a literal segment.
/// Use [`Pattern::parse`] or [`Pattern::then_any`] for wildcards.
impl<const N: usize> From<[&str; N]> for Pattern {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl<const N: usize> From<[Segment; N]> for Pattern {
    fn from(segments: [Segment; N]) -> Self {
        Self(segments.into())
    }
}

impl From<&Pattern> for Pattern {
    fn from(pattern: &Pattern) -> Self {
        pattern.clone()
    }
}
