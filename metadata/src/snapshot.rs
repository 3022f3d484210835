use crate::attributes::{Attributes, RawAttributes};
use crate::malformed_keys::MalformedKeys;
use crate::wire::null_as_default;
use serde::{Deserialize, Serialize};

/// The full instance and project configuration returned by one fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub instance: Instance,
    pub project: Project,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instance {
    pub attributes: Attributes,
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(deserialize_with = "null_as_default")]
    pub mac: String,
    #[serde(deserialize_with = "null_as_default")]
    pub forwarded_ips: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub target_instance_ips: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Project {
    pub attributes: Attributes,
    pub project_id: String,
}

// Wire shape of the recursive metadata listing. Anything not listed here is ignored,
// a `null` anywhere in the envelope reads as the empty value.
#[derive(Default, Deserialize, Serialize)]
#[serde(default)]
struct RawSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    instance: RawInstance,
    #[serde(deserialize_with = "null_as_default")]
    project: RawProject,
}

#[derive(Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct RawInstance {
    #[serde(deserialize_with = "null_as_default")]
    attributes: RawAttributes,
    #[serde(deserialize_with = "null_as_default")]
    network_interfaces: Vec<NetworkInterface>,
}

#[derive(Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct RawProject {
    #[serde(deserialize_with = "null_as_default")]
    attributes: RawAttributes,
    #[serde(deserialize_with = "null_as_default")]
    project_id: String,
}

impl Snapshot {
    /// Decodes a response body. Structural errors anywhere in the envelope fail
    /// the whole decode, only individual windows key lines are recovered from.
    pub fn decode(body: &[u8], malformed: &mut MalformedKeys) -> Result<Self, serde_json::Error> {
        let raw: RawSnapshot = serde_json::from_slice::<Option<_>>(body)?.unwrap_or_default();

        Ok(Snapshot {
            instance: Instance {
                attributes: raw.instance.attributes.into_attributes(malformed),
                network_interfaces: raw.instance.network_interfaces,
            },
            project: Project {
                attributes: raw.project.attributes.into_attributes(malformed),
                project_id: raw.project.project_id,
            },
        })
    }

    /// Renders the snapshot in the shape the metadata server uses.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let raw = RawSnapshot {
            instance: RawInstance {
                attributes: RawAttributes::from_attributes(&self.instance.attributes)?,
                network_interfaces: self.instance.network_interfaces.clone(),
            },
            project: RawProject {
                attributes: RawAttributes::from_attributes(&self.project.attributes)?,
                project_id: self.project.project_id.clone(),
            },
        };
        serde_json::to_vec(&raw)
    }
}
