//! The identity-verification seam: OIDC/OAuth login and Sigstore bundle
//! verification are out of scope for this binary, so this trait is the
//! whole of the surface — a caller embedding this CLI's plumbing wires in
//! a real provider; none ships here.

use async_trait::async_trait;

/// Opaque evidence backing an identity claim (an OIDC id token, a
/// Sigstore bundle, …). Never parsed by this crate — only ever handed to
/// a [`IdentityProvider`] implementation as-is.
pub struct Evidence {
    pub kind: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, payload: &[u8], evidence: &Evidence) -> bool;
}
