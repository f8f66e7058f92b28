//! Manifest composition: splits a [`Record`] into one config blob (identity
//! metadata) plus one blob per non-empty entity group, the same shape the
//! OCI distribution spec uses to split an image into a config blob plus
//! layers — so a peer can request a single group's bytes without pulling
//! the whole record.

use std::collections::BTreeMap;

use adir_core::{Domain, Locator, Module, Record, Signature, Skill};
use adir_codec::digest_of;
use serde::{Deserialize, Serialize};

/// Media type constants, named after the entity group they carry.
pub mod media_types {
    pub const CONFIG: &str = "application/vnd.agntcy.dir.config.v1+json";
    pub const SKILLS: &str = "application/vnd.agntcy.dir.skills.v1+json";
    pub const DOMAINS: &str = "application/vnd.agntcy.dir.domains.v1+json";
    pub const LOCATORS: &str = "application/vnd.agntcy.dir.locators.v1+json";
    pub const MODULES: &str = "application/vnd.agntcy.dir.modules.v1+json";
    pub const MANIFEST: &str = "application/vnd.agntcy.dir.manifest.v1+json";
}

/// A content descriptor: which blob, how big, and what it means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub media_type: String,
    /// Base32-encoded CID of the blob this descriptor points at.
    pub digest: String,
    pub size: u64,
}

/// The record manifest: one config descriptor plus one descriptor per
/// non-empty entity group present in the source record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Identity metadata carried in the config blob — everything about a
/// [`Record`] except the entity groups, which become separate layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    pub schema_version: String,
    pub name: String,
    pub version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// A blob decoded back into its typed entity-group contents, keyed by
/// the media type that identifies it.
pub enum Layer {
    Skills(Vec<Skill>),
    Domains(Vec<Domain>),
    Locators(Vec<Locator>),
    Modules(Vec<Module>),
}

/// Result of [`split`]: the config blob plus zero or more layer blobs,
/// each paired with the [`Descriptor`] the manifest will reference.
pub struct SplitRecord {
    pub manifest: Manifest,
    pub config_bytes: Vec<u8>,
    pub layer_bytes: Vec<(Descriptor, Vec<u8>)>,
}

/// Split `record` into a manifest plus its constituent blobs. Each
/// non-empty entity group becomes its own canonical-JSON layer; empty
/// groups are omitted entirely rather than encoded as an empty array, so
/// two records that differ only in which optional groups they carry
/// produce genuinely different manifests.
pub fn split(record: &Record) -> Result<SplitRecord, adir_codec::CodecError> {
    let config = RecordConfig {
        schema_version: record.schema_version.clone(),
        name: record.name.clone(),
        version: record.version.clone(),
        created_at: record.created_at,
        authors: record.authors.clone(),
        description: record.description.clone(),
        signatures: record.signatures.clone(),
    };
    let config_bytes = adir_codec::canonicalize(&config)?;
    let config_descriptor = descriptor_for(media_types::CONFIG, &config_bytes);

    let mut layers = Vec::new();
    let mut layer_bytes = Vec::new();

    macro_rules! push_layer {
        ($group:expr, $media_type:expr) => {
            if !$group.is_empty() {
                let bytes = adir_codec::canonicalize($group)?;
                let descriptor = descriptor_for($media_type, &bytes);
                layers.push(descriptor.clone());
                layer_bytes.push((descriptor, bytes));
            }
        };
    }

    push_layer!(&record.skills, media_types::SKILLS);
    push_layer!(&record.domains, media_types::DOMAINS);
    push_layer!(&record.locators, media_types::LOCATORS);
    push_layer!(&record.modules, media_types::MODULES);

    let manifest = Manifest {
        schema_version: record.schema_version.clone(),
        config: config_descriptor,
        layers,
        annotations: record.annotations.clone(),
    };

    Ok(SplitRecord { manifest, config_bytes, layer_bytes })
}

fn descriptor_for(media_type: &str, bytes: &[u8]) -> Descriptor {
    Descriptor {
        media_type: media_type.to_string(),
        digest: digest_of(bytes).to_encoded(),
        size: bytes.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adir_core::Skill;
    use chrono::Utc;

    fn sample_record() -> Record {
        Record {
            schema_version: "v1".into(),
            name: "example/agent".into(),
            version: "1.0.0".into(),
            created_at: Utc::now(),
            authors: vec!["team@example.com".into()],
            description: "demo".into(),
            skills: vec![Skill { category: "NLP".into(), class: "Text Completion".into() }],
            domains: vec![],
            locators: vec![],
            modules: vec![],
            signatures: vec![],
            annotations: Default::default(),
        }
    }

    #[test]
    fn omits_empty_groups_as_layers() {
        let split_record = split(&sample_record()).unwrap();
        assert_eq!(split_record.manifest.layers.len(), 1);
        assert_eq!(split_record.manifest.layers[0].media_type, media_types::SKILLS);
    }

    #[test]
    fn split_is_deterministic() {
        let record = sample_record();
        let a = split(&record).unwrap();
        let b = split(&record).unwrap();
        assert_eq!(a.manifest.config.digest, b.manifest.config.digest);
        assert_eq!(a.manifest.layers.len(), b.manifest.layers.len());
    }
}
