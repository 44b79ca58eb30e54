use crate::models::{HostKeyPolicy, HostRecord};
use crate::services::audit_service::AuditLog;
use crate::utils::error::{LwshellError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Label used for hosts without a group.
pub const UNGROUPED: &str = "Ungrouped";

/// Service for managing configuration persistence
pub struct ConfigService {
    config_dir: PathBuf,
}

impl ConfigService {
    /// Create a new config service with the default per-user directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::get_config_dir()?)
    }

    /// Create a config service with custom directory
    pub fn with_dir(config_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            tracing::debug!("Created config directory: {:?}", config_dir);

            // Set permissions to 0700 on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700))?;
            }
        }
        Ok(Self { config_dir })
    }

    /// Get default config directory
    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("lwshell"))
            .ok_or_else(|| LwshellError::ConfigError("Failed to get config directory".to_string()))
    }

    /// Get path to the host list
    pub fn hosts_file(&self) -> PathBuf {
        self.config_dir.join("servers.json")
    }

    /// Get path to app settings file
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    /// Audit log location, honouring the settings override
    pub fn audit_log(&self, settings: &AppSettings) -> AuditLog {
        let path = settings
            .audit_log_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("access.log"));
        AuditLog::new(path)
    }

    /// Load all hosts, assigning identifiers to records that lack one.
    pub fn load_hosts(&self) -> Result<Vec<HostRecord>> {
        let path = self.hosts_file();

        if !path.exists() {
            tracing::debug!("No host file found, returning empty list");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let hosts: HostsConfig = serde_json::from_str(&content).map_err(|e| {
            LwshellError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let mut servers = hosts.servers;
        if servers.iter().any(|s| s.id.is_empty()) {
            assign_missing_ids(&mut servers);
            // Persist so the new IDs stay stable across invocations.
            self.save_hosts(&servers)?;
        }

        tracing::debug!("Loaded {} hosts", servers.len());
        Ok(servers)
    }

    /// Replace the persisted host list.
    ///
    /// Writes a sibling temp file and renames it over the old one, so readers
    /// see either the old list or the new one.
    pub fn save_hosts(&self, servers: &[HostRecord]) -> Result<()> {
        let config = HostsConfig {
            servers: servers.to_vec(),
        };
        let content = serde_json::to_string_pretty(&config)?;

        let path = self.hosts_file();
        let tmp = path.with_extension("json.tmp");
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        tracing::debug!("Saved {} hosts to {:?}", servers.len(), path);
        Ok(())
    }

    /// Get a host by ID
    pub fn find_host(&self, id: &str) -> Result<Option<HostRecord>> {
        let servers = self.load_hosts()?;
        Ok(servers.into_iter().find(|s| s.id == id))
    }

    /// Add a new host and return its assigned ID
    pub fn add_host(&self, mut record: HostRecord) -> Result<String> {
        record.normalize();
        if record.name.is_empty() || record.host.is_empty() || record.user.is_empty() {
            return Err(LwshellError::ConfigError(
                "name, host and user are required".to_string(),
            ));
        }
        record.effective_port()?;

        let mut servers = self.load_hosts()?;
        record.id = next_id(&servers);
        let id = record.id.clone();
        tracing::info!("Added host {} ({})", record.name, id);
        servers.push(record);

        self.save_hosts(&servers)?;
        Ok(id)
    }

    /// Delete a host by ID
    pub fn remove_host(&self, id: &str) -> Result<bool> {
        let mut servers = self.load_hosts()?;
        let original_len = servers.len();

        servers.retain(|s| s.id != id);

        if servers.len() < original_len {
            self.save_hosts(&servers)?;
            tracing::info!("Removed host with ID: {}", id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Full host list as pretty JSON, secrets included (backup format)
    pub fn export_hosts(&self) -> Result<String> {
        let config = HostsConfig {
            servers: self.load_hosts()?,
        };
        Ok(serde_json::to_string_pretty(&config)?)
    }

    /// Parse an exported document
    pub fn parse_export(content: &str) -> Result<Vec<HostRecord>> {
        let config: HostsConfig = serde_json::from_str(content)
            .map_err(|e| LwshellError::ConfigError(format!("Invalid import file: {}", e)))?;
        Ok(config.servers)
    }

    /// Import hosts, returning the resulting host count.
    ///
    /// With `replace` the list is swapped wholesale. Otherwise records whose
    /// ID already exists are updated in place and the rest are appended with
    /// fresh IDs.
    pub fn import_hosts(&self, incoming: Vec<HostRecord>, replace: bool) -> Result<usize> {
        let servers = if replace {
            let mut servers = incoming;
            assign_missing_ids(&mut servers);
            servers
        } else {
            let mut servers = self.load_hosts()?;
            let mut max = max_numeric_id(&servers);
            for mut record in incoming {
                record.normalize();
                match servers
                    .iter_mut()
                    .find(|s| !record.id.is_empty() && s.id == record.id)
                {
                    Some(existing) => *existing = record,
                    None => {
                        max += 1;
                        record.id = max.to_string();
                        servers.push(record);
                    }
                }
            }
            servers
        };

        self.save_hosts(&servers)?;
        tracing::info!("Imported hosts, {} total", servers.len());
        Ok(servers.len())
    }

    /// Load application settings
    pub fn load_settings(&self) -> Result<AppSettings> {
        let path = self.settings_file();

        if !path.exists() {
            tracing::debug!("No settings file found, using defaults");
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: AppSettings = toml::from_str(&content)
            .map_err(|e| LwshellError::ConfigError(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save application settings
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let content = toml::to_string_pretty(settings)?;
        fs::write(self.settings_file(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostsConfig {
    #[serde(default)]
    servers: Vec<HostRecord>,
}

/// Numeric value of an ID: its digits read left to right.
pub fn numeric_id(id: &str) -> u64 {
    id.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u64, |n, d| n.saturating_mul(10).saturating_add(u64::from(d)))
}

fn max_numeric_id(servers: &[HostRecord]) -> u64 {
    servers
        .iter()
        .filter(|s| !s.id.is_empty())
        .map(|s| numeric_id(&s.id))
        .max()
        .unwrap_or(0)
}

/// Next free ID: one past the largest numeric ID in use.
pub fn next_id(servers: &[HostRecord]) -> String {
    (max_numeric_id(servers) + 1).to_string()
}

/// Give every record without an ID the next free number, in list order.
pub fn assign_missing_ids(servers: &mut [HostRecord]) {
    let mut max = max_numeric_id(servers);
    for server in servers.iter_mut().filter(|s| s.id.is_empty()) {
        max += 1;
        server.id = max.to_string();
    }
}

/// Hosts sharing a group label
#[derive(Debug, Clone)]
pub struct HostGroup {
    pub name: String,
    pub servers: Vec<HostRecord>,
}

/// Group hosts by label: named groups sorted by name, ungrouped hosts last.
pub fn group_hosts(servers: &[HostRecord]) -> Vec<HostGroup> {
    let mut groups: Vec<HostGroup> = Vec::new();
    let mut ungrouped = Vec::new();

    for server in servers {
        match server.group() {
            Some(name) => match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.servers.push(server.clone()),
                None => groups.push(HostGroup {
                    name: name.to_string(),
                    servers: vec![server.clone()],
                }),
            },
            None => ungrouped.push(server.clone()),
        }
    }

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    if !ungrouped.is_empty() {
        groups.push(HostGroup {
            name: UNGROUPED.to_string(),
            servers: ungrouped,
        });
    }
    groups
}

/// Host key checking mode as written in settings.toml
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyCheck {
    #[default]
    AcceptAny,
    KnownHosts,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub host_key_policy: HostKeyCheck,

    /// known_hosts file for `known-hosts` checking (default ~/.ssh/known_hosts)
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    /// Overrides `<config dir>/access.log`
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,

    /// Resize polling period where no resize signal is available
    #[serde(default = "default_resize_poll_interval")]
    pub resize_poll_interval_ms: u64,
}

fn default_resize_poll_interval() -> u64 {
    250
}

impl AppSettings {
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        match self.host_key_policy {
            HostKeyCheck::AcceptAny => HostKeyPolicy::AcceptAny,
            HostKeyCheck::KnownHosts => HostKeyPolicy::KnownHosts {
                path: self.known_hosts_path.clone(),
            },
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host_key_policy: HostKeyCheck::default(),
            known_hosts_path: None,
            audit_log_path: None,
            resize_poll_interval_ms: default_resize_poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (ConfigService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_dir(temp_dir.path().to_path_buf()).unwrap();
        (service, temp_dir)
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id("12"), 12);
        assert_eq!(numeric_id("srv-7"), 7);
        assert_eq!(numeric_id("a1b2"), 12);
        assert_eq!(numeric_id("abc"), 0);
    }

    #[test]
    fn test_assign_missing_ids() {
        let mut servers = vec![
            HostRecord::new("a", "a.example", "u").with_id("4"),
            HostRecord::new("b", "b.example", "u"),
            HostRecord::new("c", "c.example", "u").with_id("2"),
            HostRecord::new("d", "d.example", "u"),
        ];
        assign_missing_ids(&mut servers);
        let ids: Vec<_> = servers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "5", "2", "6"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (service, _temp) = create_test_service();
        assert!(service.load_hosts().unwrap().is_empty());
    }

    #[test]
    fn test_load_reads_legacy_format() {
        let (service, _temp) = create_test_service();
        fs::write(
            service.hosts_file(),
            r#"{"servers":[{"id":"","name":"db1","host":"10.0.0.5","port":0,
                "user":"admin","password":"secret","key_path":"","group":""}]}"#,
        )
        .unwrap();

        let servers = service.load_hosts().unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, "1");
        assert_eq!(servers[0].password(), Some("secret"));
        assert_eq!(servers[0].key_path(), None);
    }

    #[test]
    fn test_load_invalid_json() {
        let (service, _temp) = create_test_service();
        fs::write(service.hosts_file(), "{not json").unwrap();
        let err = service.load_hosts().unwrap_err();
        assert!(matches!(err, LwshellError::ConfigError(_)));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (service, temp) = create_test_service();
        service
            .save_hosts(&[HostRecord::new("a", "a.example", "u").with_id("1")])
            .unwrap();
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["servers.json"]);
    }

    #[test]
    fn test_add_requires_fields() {
        let (service, _temp) = create_test_service();
        let err = service
            .add_host(HostRecord::new(" ", "example.com", "user"))
            .unwrap_err();
        assert!(matches!(err, LwshellError::ConfigError(_)));
    }

    #[test]
    fn test_group_hosts() {
        let servers = vec![
            HostRecord::new("w1", "w1", "u").with_group("web"),
            HostRecord::new("x", "x", "u"),
            HostRecord::new("d1", "d1", "u").with_group("db"),
            HostRecord::new("w2", "w2", "u").with_group("web"),
        ];
        let groups = group_hosts(&servers);
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["db", "web", UNGROUPED]);
        assert_eq!(groups[1].servers.len(), 2);
    }

    #[test]
    fn test_settings_defaults() {
        let (service, _temp) = create_test_service();
        let settings = service.load_settings().unwrap();
        assert_eq!(settings.host_key_policy, HostKeyCheck::AcceptAny);
        assert_eq!(settings.resize_poll_interval_ms, 250);
        assert_eq!(settings.host_key_policy(), HostKeyPolicy::AcceptAny);
    }

    #[test]
    fn test_settings_known_hosts() {
        let (service, _temp) = create_test_service();
        fs::write(
            service.settings_file(),
            "host_key_policy = \"known-hosts\"\nknown_hosts_path = \"/tmp/kh\"\n",
        )
        .unwrap();
        let settings = service.load_settings().unwrap();
        assert_eq!(
            settings.host_key_policy(),
            HostKeyPolicy::KnownHosts {
                path: Some(PathBuf::from("/tmp/kh"))
            }
        );
    }

    #[test]
    fn test_audit_log_location() {
        let (service, temp) = create_test_service();
        let audit = service.audit_log(&AppSettings::default());
        assert_eq!(audit.path(), Some(temp.path().join("access.log").as_path()));

        let settings = AppSettings {
            audit_log_path: Some(PathBuf::from("/var/tmp/lwshell.log")),
            ..AppSettings::default()
        };
        assert_eq!(
            service.audit_log(&settings).path(),
            Some(Path::new("/var/tmp/lwshell.log"))
        );
    }
}
