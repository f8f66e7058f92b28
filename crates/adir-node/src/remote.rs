//! An OCI-registry-backed [`RemoteClient`]: treats the configured remote
//! the same way [`adir_store::oci::OciBackend`] treats its own registry —
//! a commodity blob store whose tag index doubles as the set of CIDs it
//! advertises.

use adir_reconciler::{ReconcileError, RemoteClient};
use async_trait::async_trait;
use oci_client::client::{Client, ClientConfig};
use oci_client::secrets::RegistryAuth;

pub struct OciRemoteClient {
    client: Client,
}

impl OciRemoteClient {
    pub fn new() -> Self {
        Self { client: Client::new(ClientConfig::default()) }
    }
}

impl Default for OciRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteClient for OciRemoteClient {
    async fn list_advertised_cids(&self, remote_url: &str) -> Result<Vec<String>, ReconcileError> {
        let reference: oci_client::Reference = remote_url
            .parse()
            .map_err(|e| ReconcileError::Other(format!("invalid remote reference {remote_url}: {e}")))?;

        self.client
            .auth(&reference, &RegistryAuth::Anonymous, oci_client::RegistryOperation::Pull)
            .await
            .map_err(|e| ReconcileError::Other(format!("authenticating against {remote_url}: {e}")))?;

        let response = self
            .client
            .list_tags(&reference, None, None)
            .await
            .map_err(|e| ReconcileError::Other(format!("listing tags at {remote_url}: {e}")))?;

        Ok(response.tags)
    }

    async fn negotiated_credentials(&self, _remote_url: &str) -> Option<(String, String)> {
        // No credential-negotiation protocol is wired up yet; regsync
        // falls back to the node's configured default credentials.
        None
    }

    async fn fetch_manifest(&self, remote_url: &str, digest: &str) -> Result<adir_store::Manifest, ReconcileError> {
        let bytes = self.pull_blob(remote_url, digest).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ReconcileError::Other(format!("corrupt manifest from remote {remote_url}: {e}")))
    }

    async fn fetch_blob(&self, remote_url: &str, digest: &str) -> Result<Vec<u8>, ReconcileError> {
        self.pull_blob(remote_url, digest).await
    }
}

impl OciRemoteClient {
    /// Every blob this node's own [`adir_store::oci::OciBackend`] writes is
    /// tagged by its own digest under one synthetic repository per
    /// directory; a remote speaking the same convention is addressed the
    /// same way — swap the tag of `remote_url`'s reference for `digest`.
    async fn pull_blob(&self, remote_url: &str, digest: &str) -> Result<Vec<u8>, ReconcileError> {
        let base: oci_client::Reference = remote_url
            .parse()
            .map_err(|e| ReconcileError::Other(format!("invalid remote reference {remote_url}: {e}")))?;
        let blob_reference: oci_client::Reference = format!("{}/{}:{}", base.registry(), base.repository(), digest)
            .parse()
            .map_err(|e| ReconcileError::Other(format!("building blob reference for {digest}: {e}")))?;

        let mut out = Vec::new();
        self.client
            .pull_blob(&blob_reference, digest, &mut out)
            .await
            .map_err(|e| ReconcileError::Other(format!("pulling blob {digest} from {remote_url}: {e}")))?;
        Ok(out)
    }
}
