use crate::malformed_keys::MalformedKeys;
use crate::windows_key::WindowsKey;
use serde::{Deserialize, Serialize};

/// Instance or project attributes after semantic decoding.
///
/// The boolean knobs are `None` when the server did not send a value that
/// parses as a boolean. Callers apply their own default in that case, which is
/// not necessarily `false`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub windows_keys: Vec<WindowsKey>,
    pub diagnostics: String,
    pub disable_address_manager: Option<bool>,
    pub disable_account_manager: Option<bool>,
    pub enable_diagnostics: Option<bool>,
    pub enable_wsfc: Option<bool>,
    pub wsfc_addresses: String,
    pub wsfc_agent_port: String,
}

/// Attributes exactly as the metadata server sends them: every value is a string.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawAttributes {
    #[serde(rename = "windows-keys", skip_serializing_if = "Option::is_none")]
    pub windows_keys: Option<String>,
    #[serde(rename = "diagnostics", skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(rename = "disable-address-manager", skip_serializing_if = "Option::is_none")]
    pub disable_address_manager: Option<String>,
    #[serde(rename = "disable-account-manager", skip_serializing_if = "Option::is_none")]
    pub disable_account_manager: Option<String>,
    #[serde(rename = "enable-diagnostics", skip_serializing_if = "Option::is_none")]
    pub enable_diagnostics: Option<String>,
    #[serde(rename = "enable-wsfc", skip_serializing_if = "Option::is_none")]
    pub enable_wsfc: Option<String>,
    #[serde(rename = "wsfc-addrs", skip_serializing_if = "Option::is_none")]
    pub wsfc_addresses: Option<String>,
    #[serde(rename = "wsfc-agent-port", skip_serializing_if = "Option::is_none")]
    pub wsfc_agent_port: Option<String>,
}

impl RawAttributes {
    /// Second decoding step. Never fails: unparseable booleans become `None`
    /// without a diagnostic, broken key lines are reported through `malformed`
    /// and skipped, unusable keys are dropped.
    pub fn into_attributes(self, malformed: &mut MalformedKeys) -> Attributes {
        Attributes {
            windows_keys: self
                .windows_keys
                .as_deref()
                .map(|keys| decode_windows_keys(keys, malformed))
                .unwrap_or_default(),
            diagnostics: self.diagnostics.unwrap_or_default(),
            disable_address_manager: parse_bool(self.disable_address_manager.as_deref()),
            disable_account_manager: parse_bool(self.disable_account_manager.as_deref()),
            enable_diagnostics: parse_bool(self.enable_diagnostics.as_deref()),
            enable_wsfc: parse_bool(self.enable_wsfc.as_deref()),
            wsfc_addresses: self.wsfc_addresses.unwrap_or_default(),
            wsfc_agent_port: self.wsfc_agent_port.unwrap_or_default(),
        }
    }

    /// Inverse of [`RawAttributes::into_attributes`] for usable keys.
    pub fn from_attributes(attributes: &Attributes) -> Result<Self, serde_json::Error> {
        let windows_keys = if attributes.windows_keys.is_empty() {
            None
        } else {
            let lines = attributes
                .windows_keys
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?;
            Some(lines.join("\n"))
        };

        Ok(RawAttributes {
            windows_keys,
            diagnostics: non_empty(&attributes.diagnostics),
            disable_address_manager: attributes.disable_address_manager.map(|b| b.to_string()),
            disable_account_manager: attributes.disable_account_manager.map(|b| b.to_string()),
            enable_diagnostics: attributes.enable_diagnostics.map(|b| b.to_string()),
            enable_wsfc: attributes.enable_wsfc.map(|b| b.to_string()),
            wsfc_addresses: non_empty(&attributes.wsfc_addresses),
            wsfc_agent_port: non_empty(&attributes.wsfc_agent_port),
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
/// Anything else, including an empty string, yields `None`.
pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    match value? {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Splits the `windows-keys` attribute into lines and decodes each one on its own.
/// One broken line never affects the others. Blank lines are not valid JSON and
/// are reported like any other broken line, a `null` line decodes to an empty
/// key that the validator drops.
pub fn decode_windows_keys(raw: &str, malformed: &mut MalformedKeys) -> Vec<WindowsKey> {
    let mut keys = Vec::new();

    for line in raw.split('\n') {
        let key: WindowsKey = match serde_json::from_str::<Option<WindowsKey>>(line) {
            Ok(key) => key.unwrap_or_default(),
            Err(e) => {
                malformed.report_once(line, &e);
                continue;
            }
        };

        if key.is_usable() {
            keys.push(key);
        }
    }

    keys
}
