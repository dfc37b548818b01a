//! Wire schema for the HTTP/JSON nodetree import/export format (`NodeTreeN`)
//! and the function catalog (`SchemaF`), matching `spec.md` §6 and grounded
//! in the source's `opsi.webserver.schema` Pydantic models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{DynValue, ValueType};

/// A link reference embedded in a node's `inputs` map: `{id, name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkN {
    pub id: String,
    pub name: String,
}

/// One node in a serialized nodetree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeN {
    #[serde(rename = "type")]
    pub func_type: String,
    pub id: String,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Option<LinkN>>,
    #[serde(default)]
    pub pos: Option<serde_json::Value>,
    /// Opaque client-owned data (e.g. editor notes). Never read or
    /// validated, only carried through import/export unchanged (`spec.md`
    /// §4.4: "optional `pos` and `extras` are opaque and preserved
    /// round-trip").
    #[serde(default)]
    pub extras: Option<serde_json::Value>,
}

/// The full serialized graph posted to/read from `/api/nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTreeN {
    pub nodes: Vec<NodeN>,
}

/// Catalog entry for one Settings/Inputs/Outputs field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputOutputF {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl InputOutputF {
    #[must_use]
    pub fn from_value_type(value_type: &ValueType, default: Option<&DynValue>) -> Self {
        let mut params = BTreeMap::new();
        match value_type {
            ValueType::Range(w) | ValueType::Slide(w) => {
                params.insert("min".into(), serde_json::json!(w.min));
                params.insert("max".into(), serde_json::json!(w.max));
                params.insert("decimal".into(), serde_json::json!(w.decimal));
            }
            ValueType::Enum(items) => {
                params.insert("items".into(), serde_json::json!(items));
            }
            _ => {}
        }
        if let Some(default) = default {
            if let Ok(v) = serde_json::to_value(default) {
                params.insert("default".into(), v);
            }
        }
        Self {
            type_name: value_type.type_name().to_string(),
            params,
        }
    }
}

/// Catalog entry for one Function type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionF {
    pub name: String,
    #[serde(rename = "type")]
    pub func_type: String,
    pub settings: BTreeMap<String, InputOutputF>,
    pub inputs: BTreeMap<String, InputOutputF>,
    pub outputs: BTreeMap<String, InputOutputF>,
}

/// Catalog entry for one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleF {
    pub package: String,
    pub version: String,
    pub funcs: Vec<FunctionF>,
}

/// The full `/api/funcs` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaF {
    pub modules: Vec<ModuleF>,
}

/// Network configuration, `POST /api/network` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub team: u32,
    pub mode: NetworkMode,
    pub static_ext: u8,
}

/// Discriminator for `Network.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NetworkMode {
    #[serde(rename = "mDNS")]
    Mdns,
    Static,
    Localhost,
}

/// Error returned by [`Network::validate`].
#[derive(Debug, thiserror::Error)]
pub enum NetworkValidationError {
    #[error("team number {0} out of range 1..=9999")]
    TeamOutOfRange(u32),
    #[error("static IP extension {0} out of range 2..=255")]
    StaticExtOutOfRange(u8),
}

impl Network {
    pub fn validate(&self) -> Result<(), NetworkValidationError> {
        if !(1..=9999).contains(&self.team) {
            return Err(NetworkValidationError::TeamOutOfRange(self.team));
        }
        if !(2..=255).contains(&self.static_ext) {
            return Err(NetworkValidationError::StaticExtOutOfRange(self.static_ext));
        }
        Ok(())
    }
}

/// Persisted per-user preferences: the active profile slot and network
/// settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub profile: u8,
    pub network: Network,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            profile: 0,
            network: Network {
                team: 1,
                mode: NetworkMode::Static,
                static_ext: 2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_validates_team_range() {
        let mut net = Preferences::default().network;
        net.team = 0;
        assert!(net.validate().is_err());
        net.team = 10_000;
        assert!(net.validate().is_err());
        net.team = 5940;
        assert!(net.validate().is_ok());
    }

    #[test]
    fn nodetree_round_trips_through_json() {
        let tree = NodeTreeN {
            nodes: vec![NodeN {
                func_type: "demo/Five".into(),
                id: "a".into(),
                settings: BTreeMap::new(),
                inputs: BTreeMap::new(),
                pos: None,
                extras: None,
            }],
        };
        let json = serde_json::to_string(&tree).unwrap();
        let back: NodeTreeN = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes.len(), 1);
        assert_eq!(back.nodes[0].id, "a");
    }

    #[test]
    fn nodetree_preserves_opaque_extras_through_json() {
        let tree = NodeTreeN {
            nodes: vec![NodeN {
                func_type: "demo/Five".into(),
                id: "a".into(),
                settings: BTreeMap::new(),
                inputs: BTreeMap::new(),
                pos: Some(serde_json::json!({"x": 10.0, "y": 20.0})),
                extras: Some(serde_json::json!({"note": "editor-only"})),
            }],
        };
        let json = serde_json::to_string(&tree).unwrap();
        let back: NodeTreeN = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes[0].extras, tree.nodes[0].extras);
        assert_eq!(back.nodes[0].pos, tree.nodes[0].pos);
    }
}
