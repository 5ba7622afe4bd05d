// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::{
    errors::UrlError,
    hash::{sha256, Hash},
};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash as StdHash, Hasher},
    str::FromStr,
};

pub const SCHEME: &str = "acc";

/// A hierarchical account URL: `acc://authority/path?query#fragment`.
///
/// Authorities and paths are ASCII case-insensitive; URLs are normalized to
/// lower case at parse time so equality, ordering and hashing are plain
/// byte comparisons. The query carries `?txid=`, `?start=`, `?count=`; the
/// fragment addresses sub-objects of an account (a chain, an entry, a
/// transaction).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Url {
    authority: String,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Url {
    /// Parses a URL. The `acc://` scheme is optional; any other scheme is
    /// rejected.
    pub fn parse(s: &str) -> Result<Url, UrlError> {
        let mut rest = s;
        if let Some(idx) = rest.find("://") {
            if !rest[..idx].eq_ignore_ascii_case(SCHEME) {
                return Err(UrlError::BadScheme(s.into()));
            }
            rest = &rest[idx + 3..];
        }

        if let Some(c) =
            rest.chars().find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(UrlError::InvalidCharacter(s.into(), c));
        }

        // The fragment is everything after the first '#'. A query may appear
        // on either side of the fragment marker.
        let (rest, mut fragment) = match rest.find('#') {
            Some(i) => (&rest[..i], Some(rest[i + 1..].to_string())),
            None => (rest, None),
        };
        let mut query = None;
        if let Some(f) = fragment.as_mut() {
            if let Some(i) = f.find('?') {
                query = Some(f[i + 1..].to_string());
                f.truncate(i);
            }
        }
        let rest = match rest.find('?') {
            Some(i) => {
                query = Some(rest[i + 1..].to_string());
                &rest[..i]
            }
            None => rest,
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], rest[i..].trim_end_matches('/')),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(UrlError::EmptyAuthority(s.into()));
        }

        Ok(Url {
            authority: authority.to_ascii_lowercase(),
            path: path.to_ascii_lowercase(),
            query: query.map(|q| q.to_ascii_lowercase()),
            fragment: fragment
                .filter(|f| !f.is_empty())
                .map(|f| f.to_ascii_lowercase()),
        })
    }

    pub fn authority(&self) -> &str { &self.authority }

    /// The path, including its leading slash, or "" for a bare authority.
    pub fn path(&self) -> &str { &self.path }

    pub fn query(&self) -> Option<&str> { self.query.as_deref() }

    pub fn fragment(&self) -> Option<&str> { self.fragment.as_deref() }

    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// This URL without its query and fragment.
    pub fn strip_extras(&self) -> Url {
        Url {
            authority: self.authority.clone(),
            path: self.path.clone(),
            query: None,
            fragment: None,
        }
    }

    pub fn with_fragment(&self, fragment: &str) -> Url {
        let mut u = self.strip_extras();
        u.fragment = Some(fragment.to_ascii_lowercase());
        u
    }

    /// Appends one path segment.
    pub fn join(&self, segment: &str) -> Url {
        let mut u = self.strip_extras();
        u.path.push('/');
        u.path.push_str(&segment.trim_matches('/').to_ascii_lowercase());
        u
    }

    /// The authority with no path: the root identity that owns this account.
    pub fn root_identity(&self) -> Url {
        Url {
            authority: self.authority.clone(),
            path: String::new(),
            query: None,
            fragment: None,
        }
    }

    /// This URL with the last path segment removed; the identity a
    /// sub-account belongs to. A bare authority is its own identity.
    pub fn identity(&self) -> Url {
        match self.path.rfind('/') {
            None | Some(0) => self.root_identity(),
            Some(i) => Url {
                authority: self.authority.clone(),
                path: self.path[..i].to_string(),
                query: None,
                fragment: None,
            },
        }
    }

    pub fn is_root_identity(&self) -> bool { self.path.is_empty() }

    /// True when `other` is this URL or a descendant of it.
    pub fn prefix_of(&self, other: &Url) -> bool {
        if self.authority != other.authority {
            return false;
        }
        if self.path.is_empty() {
            return true;
        }
        other.path == self.path
            || other
                .path
                .strip_prefix(self.path.as_str())
                .map_or(false, |rest| rest.starts_with('/'))
    }

    /// Two URLs are local to each other when they share a root identity,
    /// and are therefore guaranteed to route to the same partition.
    pub fn local_to(&self, other: &Url) -> bool {
        self.authority == other.authority
    }

    /// The routing number: the first 8 bytes of SHA-256 of the lowercased
    /// authority, interpreted big-endian. Stable across partition counts.
    pub fn routing(&self) -> u64 {
        sha256(self.authority.as_bytes()).prefix_u64()
    }

    /// The account ID, used as the BPT key and in storage keys.
    pub fn account_id(&self) -> Hash {
        let mut buf =
            String::with_capacity(self.authority.len() + self.path.len());
        buf.push_str(&self.authority);
        buf.push_str(&self.path);
        sha256(buf.as_bytes())
    }

    /// Typed access to a query parameter, e.g. `?start=10&count=20`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key).then_some(v)
        })
    }

    pub fn query_u64(&self, key: &str) -> Result<Option<u64>, UrlError> {
        match self.query_value(key) {
            None => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| {
                UrlError::BadQueryValue("numeric query", v.to_string())
            }),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}{}", SCHEME, self.authority, self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{}", q)?;
        }
        if let Some(frag) = &self.fragment {
            write!(f, "#{}", frag)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Url, UrlError> { Url::parse(s) }
}

impl StdHash for Url {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.authority.hash(state);
        self.path.hash(state);
        self.query.hash(state);
        self.fragment.hash(state);
    }
}

impl Ord for Url {
    fn cmp(&self, other: &Url) -> Ordering {
        (&self.authority, &self.path, &self.query, &self.fragment).cmp(&(
            &other.authority,
            &other.path,
            &other.query,
            &other.fragment,
        ))
    }
}

impl PartialOrd for Url {
    fn partial_cmp(&self, other: &Url) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let u = Url::parse("acc://Alice/Tokens").unwrap();
        assert_eq!(u.authority(), "alice");
        assert_eq!(u.path(), "/tokens");
        assert_eq!(u.to_string(), "acc://alice/tokens");
    }

    #[test]
    fn scheme_is_optional_but_checked() {
        assert!(Url::parse("alice/tokens").is_ok());
        assert!(matches!(
            Url::parse("http://alice"),
            Err(UrlError::BadScheme(_))
        ));
        assert!(matches!(Url::parse("acc://"), Err(UrlError::EmptyAuthority(_))));
    }

    #[test]
    fn fragment_and_query() {
        let u = Url::parse("acc://alice/data#entry/4?start=2").unwrap();
        assert_eq!(u.fragment(), Some("entry/4"));
        assert_eq!(u.query_u64("start").unwrap(), Some(2));

        let v = Url::parse("acc://alice/data?count=7#chain/main").unwrap();
        assert_eq!(v.fragment(), Some("chain/main"));
        assert_eq!(v.query_u64("count").unwrap(), Some(7));
    }

    #[test]
    fn identity_walks() {
        let u = Url::parse("acc://alice/book/1").unwrap();
        assert_eq!(u.identity().to_string(), "acc://alice/book");
        assert_eq!(u.root_identity().to_string(), "acc://alice");
        assert!(u.root_identity().prefix_of(&u));
        assert!(!Url::parse("acc://alice/boo").unwrap().prefix_of(&u));
    }

    #[test]
    fn case_insensitive_equality_and_routing() {
        let a = Url::parse("acc://ALICE/Tokens").unwrap();
        let b = Url::parse("acc://alice/tokens").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.routing(), b.routing());
        assert_eq!(a.account_id(), b.account_id());
    }

    #[test]
    fn local_to_follows_authority() {
        let a = Url::parse("acc://alice/tokens").unwrap();
        let b = Url::parse("acc://alice/book").unwrap();
        let c = Url::parse("acc://bob/tokens").unwrap();
        assert!(a.local_to(&b));
        assert!(!a.local_to(&c));
    }
}
