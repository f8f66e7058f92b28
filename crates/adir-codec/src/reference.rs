//! Reference parsing: turns the five string shapes a caller may type —
//!
//!   * `b<cid>`                 (bare digest)
//!   * `name`
//!   * `name:version`
//!   * `name@b<cid>`
//!   * `name:version@b<cid>`
//!
//! into a structured [`Reference`]. The one ambiguity is the last
//! colon-segment of the name part: OCI-style names routinely embed a
//! `host:port` (`registry.example.com:5000/my-agent`), so a trailing
//! `:segment` is only treated as a version when that segment parses as a
//! semver version. A bare port number never does (`semver::Version`
//! requires at least `major.minor.patch`), so `host:5000/name` keeps its
//! port in the name and `name:1.2.3` splits as expected.

use adir_core::{Cid, Reference};
use semver::Version;

use crate::error::CodecError;

pub fn parse_reference(input: &str) -> Result<Reference, CodecError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CodecError::bad_reference(input, "empty reference"));
    }

    let (left, cid) = match s.rsplitn(2, '@').collect::<Vec<_>>().as_slice() {
        [right, left] => {
            let cid = Cid::parse(right)
                .ok_or_else(|| CodecError::bad_reference(input, format!("invalid CID suffix {right:?}")))?;
            (*left, Some(cid))
        }
        [only] => (*only, None),
        _ => unreachable!(),
    };

    if left.is_empty() {
        return match cid {
            Some(cid) => Ok(Reference::by_cid(cid)),
            None => Err(CodecError::bad_reference(input, "missing name before '@'")),
        };
    }

    // A bare CID with no name and no `@cid` suffix, e.g. `bafy...`.
    if cid.is_none() {
        if let Some(bare) = Cid::parse(left) {
            return Ok(Reference::by_cid(bare));
        }
    }

    let (name, version) = match left.rsplit_once(':') {
        Some((name, maybe_version)) if looks_like_version(maybe_version) => {
            (name, Some(maybe_version.to_string()))
        }
        _ => (left, None),
    };

    if name.is_empty() {
        return Err(CodecError::bad_reference(input, "empty name"));
    }

    let mut reference = Reference::by_name(name, version);
    reference.cid = cid;
    Ok(reference)
}

fn looks_like_version(segment: &str) -> bool {
    Version::parse(segment.strip_prefix('v').unwrap_or(segment)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adir_core::Cid;

    fn sample_cid() -> Cid {
        Cid::from_sha256([7u8; 32])
    }

    #[test]
    fn parses_bare_cid() {
        let cid = sample_cid();
        let r = parse_reference(&cid.to_encoded()).unwrap();
        assert_eq!(r.cid.as_ref(), Some(&cid));
        assert!(r.name.is_none());
    }

    #[test]
    fn parses_bare_name() {
        let r = parse_reference("my-agent").unwrap();
        assert_eq!(r.name.as_deref(), Some("my-agent"));
        assert!(r.version.is_none());
        assert!(r.cid.is_none());
    }

    #[test]
    fn parses_name_and_version() {
        let r = parse_reference("my-agent:1.2.3").unwrap();
        assert_eq!(r.name.as_deref(), Some("my-agent"));
        assert_eq!(r.version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn parses_v_prefixed_version() {
        let r = parse_reference("directory.agntcy.org/cisco/marketing-v4:v4.0.0").unwrap();
        assert_eq!(r.name.as_deref(), Some("directory.agntcy.org/cisco/marketing-v4"));
        assert_eq!(r.version.as_deref(), Some("v4.0.0"));
    }

    #[test]
    fn does_not_mistake_a_host_port_for_a_version() {
        let r = parse_reference("registry.example.com:5000/my-agent").unwrap();
        assert_eq!(r.name.as_deref(), Some("registry.example.com:5000/my-agent"));
        assert!(r.version.is_none());
    }

    #[test]
    fn parses_name_at_cid() {
        let cid = sample_cid();
        let s = format!("my-agent@{}", cid.to_encoded());
        let r = parse_reference(&s).unwrap();
        assert_eq!(r.name.as_deref(), Some("my-agent"));
        assert_eq!(r.cid.as_ref(), Some(&cid));
        assert!(r.requires_digest_check());
    }

    #[test]
    fn parses_name_version_at_cid() {
        let cid = sample_cid();
        let s = format!("my-agent:2.0.0@{}", cid.to_encoded());
        let r = parse_reference(&s).unwrap();
        assert_eq!(r.name.as_deref(), Some("my-agent"));
        assert_eq!(r.version.as_deref(), Some("2.0.0"));
        assert_eq!(r.cid.as_ref(), Some(&cid));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_reference("").is_err());
        assert!(parse_reference("   ").is_err());
    }

    #[test]
    fn rejects_invalid_cid_suffix() {
        assert!(parse_reference("my-agent@not-a-cid").is_err());
    }
}
