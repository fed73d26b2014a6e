use serde::Deserialize;

use crate::directory::provisioning::DEFAULT_SOURCE;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Whether the server is started at all
    pub active: bool,

    /// Publish the bound port in the process-wide registry
    #[serde(rename = "setSystemProperties")]
    pub publish_port: bool,

    /// Host to listen on, loopback if unset. Only used together with a fixed port.
    #[serde(with = "serde_with::rust::string_empty_as_none")]
    pub host: Option<String>,

    /// Port to listen on, `0` lets the OS pick one
    pub port: u16,

    pub provisioning: bool,

    /// Path of an LDIF file or directory, name of a bundled resource, or LDIF content
    pub provisioning_source: String,

    /// Base DNs separated by `|`
    pub base_dn: String,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            active: true,
            publish_port: false,
            host: Some(String::from("localhost")),
            port: 4444,
            provisioning: true,
            provisioning_source: DEFAULT_SOURCE.to_owned(),
            base_dn: String::from("dc=demo,dc=com"),
        };
    }
}
