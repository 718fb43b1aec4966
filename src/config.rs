//! Server configuration model.
//!
//! [`ServerConfig`] is a plain serde structure; the daemon wrapper loads
//! it from TOML via [`ServerConfig::from_toml_str`] and hands it to
//! [`crate::server::NfsServer`]. Every field has a default so an empty
//! document yields a working single-export server.

use std::path::PathBuf;

use serde::Deserialize;

use crate::exports::{ClientSpec, Export, ExportOptions};

/// One export as it appears in the configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportConfig {
    /// Directory to export
    pub path: PathBuf,
    /// Client specs; defaults to everyone
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,
    /// exports(5)-style option list
    #[serde(default)]
    pub options: String,
    /// Free-form operator comment
    #[serde(default)]
    pub comment: String,
}

fn default_clients() -> Vec<String> {
    vec!["*".to_string()]
}

impl ExportConfig {
    /// Converts the textual form into a gate-ready [`Export`].
    pub fn to_export(&self) -> Export {
        Export {
            path: self.path.clone(),
            clients: self.clients.iter().map(|c| ClientSpec::parse(c)).collect(),
            options: ExportOptions::parse(&self.options),
            comment: self.comment.clone(),
        }
    }
}

/// Complete server configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub listen_address: String,
    /// NFS port, TCP and UDP
    pub listen_port: u16,
    /// Portmapper port, TCP and UDP
    pub portmap_port: u16,
    /// Default export root used when `exports` is empty
    pub root_path: PathBuf,
    /// Export list
    pub exports: Vec<ExportConfig>,
    /// Ceiling on concurrent TCP connections
    pub max_connections: usize,
    /// Worker pool size advertised to the runtime builder
    pub thread_count: usize,
    /// Server-default squash rules, applied by the auth dispatcher when
    /// an export does not override them
    pub root_squash: bool,
    pub all_squash: bool,
    pub anon_uid: u32,
    pub anon_gid: u32,
    /// Enabled auth flavors: any of "none", "sys", "dh", "gss"
    pub security_mode: Vec<String>,
    /// Preferred transfer sizes advertised by FSINFO
    pub read_size: u32,
    pub write_size: u32,
    /// Attribute/content cache tuning
    pub cache_enabled: bool,
    pub cache_size: u64,
    /// Attribute TTL in seconds
    pub cache_ttl: u64,
    /// Seconds of TCP inactivity before a connection is closed
    pub idle_timeout: u64,
    /// Ceiling on portmapper registrations
    pub portmap_max_mappings: usize,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 2049,
            portmap_port: 111,
            root_path: PathBuf::from("/srv/export"),
            exports: Vec::new(),
            max_connections: 256,
            thread_count: 4,
            root_squash: true,
            all_squash: false,
            anon_uid: crate::exports::ANON_UID,
            anon_gid: crate::exports::ANON_GID,
            security_mode: vec!["sys".to_string(), "none".to_string()],
            read_size: 65536,
            write_size: 65536,
            cache_enabled: true,
            cache_size: 10_000,
            cache_ttl: crate::cache::ATTR_TTL.as_secs(),
            idle_timeout: 30,
            portmap_max_mappings: 1000,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document into a configuration.
    pub fn from_toml_str(document: &str) -> Result<ServerConfig, toml::de::Error> {
        toml::from_str(document)
    }

    /// The exports to install: the configured list, or a single
    /// everyone-readable export of `root_path` when the list is empty.
    pub fn effective_exports(&self) -> Vec<Export> {
        if self.exports.is_empty() {
            let mut options = ExportOptions {
                root_squash: self.root_squash,
                all_squash: self.all_squash,
                anon_uid: self.anon_uid,
                anon_gid: self.anon_gid,
                ..ExportOptions::default()
            };
            options.read_write = false;
            return vec![Export {
                path: self.root_path.clone(),
                clients: vec![ClientSpec::Any],
                options,
                comment: "default export".to_string(),
            }];
        }
        self.exports.iter().map(ExportConfig::to_export).collect()
    }

    /// True when `flavor` appears in `security_mode`.
    pub fn flavor_enabled(&self, flavor: &str) -> bool {
        self.security_mode.iter().any(|f| f.eq_ignore_ascii_case(flavor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.listen_port, 2049);
        assert_eq!(config.portmap_port, 111);
        assert_eq!(config.listen_address, "0.0.0.0");
        assert!(config.flavor_enabled("sys"));
        assert!(config.flavor_enabled("none"));
        assert!(!config.flavor_enabled("gss"));
        let exports = config.effective_exports();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].path, PathBuf::from("/srv/export"));
    }

    #[test]
    fn full_document_round_trips() {
        let document = r#"
listen_address = "127.0.0.1"
listen_port = 12049
root_squash = false
security_mode = ["sys"]
read_size = 131072

[[exports]]
path = "/srv/data"
clients = ["10.0.0.0/8", "*.lab.example.com"]
options = "rw,async,anonuid=99"
comment = "scratch space"
"#;
        let config = ServerConfig::from_toml_str(document).unwrap();
        assert_eq!(config.listen_port, 12049);
        assert_eq!(config.read_size, 131072);
        assert!(!config.root_squash);
        let exports = config.effective_exports();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].path, PathBuf::from("/srv/data"));
        assert!(exports[0].options.read_write);
        assert!(!exports[0].options.sync_writes);
        assert_eq!(exports[0].options.anon_uid, 99);
        assert_eq!(exports[0].clients.len(), 2);
    }

    #[test]
    fn bad_document_is_an_error() {
        assert!(ServerConfig::from_toml_str("listen_port = \"not a port\"").is_err());
    }
}
