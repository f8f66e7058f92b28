use crate::cid::Cid;

/// A parsed `name[:version][@cid]` reference. Construction (parsing the
/// various shapes) lives in `adir-codec`; this type is the shared shape
/// every crate downstream of the parser works with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub name: Option<String>,
    pub version: Option<String>,
    pub cid: Option<Cid>,
}

impl Reference {
    pub fn by_cid(cid: Cid) -> Self {
        Self { name: None, version: None, cid: Some(cid) }
    }

    pub fn by_name(name: impl Into<String>, version: Option<String>) -> Self {
        Self { name: Some(name.into()), version, cid: None }
    }

    /// `true` if resolving this reference must end with a byte-exact CID
    /// match (an `@cid` suffix was present).
    pub fn requires_digest_check(&self) -> bool {
        self.cid.is_some() && self.name.is_some()
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.version, &self.cid) {
            (Some(n), Some(v), Some(c)) => write!(f, "{n}:{v}@{c}"),
            (Some(n), Some(v), None) => write!(f, "{n}:{v}"),
            (Some(n), None, Some(c)) => write!(f, "{n}@{c}"),
            (Some(n), None, None) => write!(f, "{n}"),
            (None, _, Some(c)) => write!(f, "{c}"),
            (None, _, None) => write!(f, "<empty reference>"),
        }
    }
}
