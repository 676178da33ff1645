use crate::errors::CredmapError;
use crate::logging::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::options::PasswordOptions;
use crate::partition::{
    default_roles, RoleName, RoleSpec, NEW_PASSWORD_ROLE, UNASSIGNED_ALIASES, USERNAME_ROLE,
};
use crate::readiness::ReadinessPolicy;
use crate::runtime::FileSystem;
use crate::synthesize::{SynthesisPlan, RESERVED_KEYS};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub no_log: bool,
    pub allow_unassigned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub roles: Vec<RoleSpec>,
    pub readiness: ReadinessPolicy,
    pub synthesis: SynthesisConfig,
    pub password_options: PasswordOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub username_role: RoleName,
    pub password_role: RoleName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub budget_bytes: u64,
    pub max_payload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roles: default_roles(),
            readiness: ReadinessPolicy::default(),
            synthesis: SynthesisConfig {
                username_role: RoleName::new(USERNAME_ROLE),
                password_role: RoleName::new(NEW_PASSWORD_ROLE),
            },
            password_options: PasswordOptions::default(),
            logging: LoggingConfig {
                enabled: true,
                path: PathBuf::from(".cache/credmap/session.jsonl"),
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
        }
    }
}

impl AppConfig {
    pub fn synthesis_plan(&self) -> SynthesisPlan {
        SynthesisPlan {
            username_role: self.synthesis.username_role.clone(),
            password_role: self.synthesis.password_role.clone(),
            readiness: self.readiness,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialAppConfig {
    roles: Option<Vec<RoleSpec>>,
    readiness: Option<PartialReadinessConfig>,
    synthesis: Option<PartialSynthesisConfig>,
    password_options: Option<PartialPasswordOptions>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialReadinessConfig {
    require_unassigned_empty: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialSynthesisConfig {
    username_role: Option<RoleName>,
    password_role: Option<RoleName>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialPasswordOptions {
    length: Option<u32>,
    lowercase: Option<bool>,
    uppercase: Option<bool>,
    numbers: Option<bool>,
    symbols: Option<bool>,
    exclude_similar_characters: Option<bool>,
    exclude: Option<String>,
    strict: Option<bool>,
    symbols_to_use: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLoggingConfig {
    enabled: Option<bool>,
    path: Option<PathBuf>,
    budget_bytes: Option<u64>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, CredmapError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| CredmapError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    cfg.logging.path = absolutize_path(process_cwd, &cfg.logging.path);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(roles) = partial.roles {
        cfg.roles = roles;
    }

    if let Some(readiness) = partial.readiness {
        if let Some(value) = readiness.require_unassigned_empty {
            cfg.readiness.require_unassigned_empty = value;
        }
    }

    if let Some(synthesis) = partial.synthesis {
        if let Some(role) = synthesis.username_role {
            cfg.synthesis.username_role = role;
        }
        if let Some(role) = synthesis.password_role {
            cfg.synthesis.password_role = role;
        }
    }

    if let Some(options) = partial.password_options {
        let target = &mut cfg.password_options;
        if let Some(value) = options.length {
            target.length = value;
        }
        if let Some(value) = options.lowercase {
            target.lowercase = value;
        }
        if let Some(value) = options.uppercase {
            target.uppercase = value;
        }
        if let Some(value) = options.numbers {
            target.numbers = value;
        }
        if let Some(value) = options.symbols {
            target.symbols = value;
        }
        if let Some(value) = options.exclude_similar_characters {
            target.exclude_similar_characters = value;
        }
        if let Some(value) = options.exclude {
            target.exclude = value;
        }
        if let Some(value) = options.strict {
            target.strict = value;
        }
        if let Some(value) = options.symbols_to_use {
            target.symbols_to_use = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.enabled {
            cfg.logging.enabled = value;
        }
        if let Some(value) = logging.path {
            cfg.logging.path = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(path) = &overrides.log_path {
        cfg.logging.path = path.clone();
        cfg.logging.enabled = true;
    }
    if overrides.no_log {
        cfg.logging.enabled = false;
    }
    if overrides.allow_unassigned {
        cfg.readiness.require_unassigned_empty = false;
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), CredmapError> {
    if cfg.roles.is_empty() {
        return Err(CredmapError::InvalidConfig(
            "at least one role must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for spec in &cfg.roles {
        let name = spec.name.as_str();
        if name.trim().is_empty() {
            return Err(CredmapError::InvalidConfig(
                "role names must not be empty".to_string(),
            ));
        }
        if UNASSIGNED_ALIASES.contains(&name) || RESERVED_KEYS.contains(&name) {
            return Err(CredmapError::InvalidConfig(format!(
                "role name {name} is reserved"
            )));
        }
        if !seen.insert(name) {
            return Err(CredmapError::InvalidConfig(format!(
                "role {name} is configured twice"
            )));
        }
    }

    for (key, role) in [
        ("synthesis.username_role", &cfg.synthesis.username_role),
        ("synthesis.password_role", &cfg.synthesis.password_role),
    ] {
        if !seen.contains(role.as_str()) {
            return Err(CredmapError::InvalidConfig(format!(
                "{key} names unknown role {role}"
            )));
        }
    }

    if cfg.password_options.length == 0 {
        return Err(CredmapError::InvalidConfig(
            "password_options.length must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, AppConfig, CliOverrides};
    use crate::errors::CredmapError;
    use crate::runtime::FakeFileSystem;
    use std::path::{Path, PathBuf};

    fn load(text: &str, overrides: CliOverrides) -> Result<AppConfig, CredmapError> {
        let fs = FakeFileSystem::with_file("/credmap.toml", text);
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/credmap.toml")),
            ..overrides
        };
        load_config(&overrides, Path::new("/work"), &fs)
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let fs = FakeFileSystem::default();
        let cfg = load_config(&CliOverrides::default(), Path::new("/work"), &fs).expect("cfg");
        assert_eq!(cfg.roles.len(), 3);
        assert!(cfg.readiness.require_unassigned_empty);
        assert_eq!(cfg.logging.path, PathBuf::from("/work/.cache/credmap/session.jsonl"));
        assert_eq!(cfg.synthesis_plan().password_role.as_str(), "newPasswordMappings");
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let cfg = load(
            r##"
[readiness]
require_unassigned_empty = false

[password_options]
length = 24
symbols_to_use = "#!"

[logging]
path = "/var/log/credmap.jsonl"
"##,
            CliOverrides::default(),
        )
        .expect("cfg");
        assert!(!cfg.readiness.require_unassigned_empty);
        assert_eq!(cfg.password_options.length, 24);
        assert_eq!(cfg.password_options.symbols_to_use, "#!");
        assert!(cfg.password_options.strict);
        assert_eq!(cfg.logging.path, PathBuf::from("/var/log/credmap.jsonl"));
    }

    #[test]
    fn custom_roles_replace_defaults() {
        let cfg = load(
            r#"
[[roles]]
name = "usernameMappings"

[[roles]]
name = "newPasswordMappings"

[[roles]]
name = "otpMappings"
required = false
"#,
            CliOverrides::default(),
        )
        .expect("cfg");
        let names = cfg.roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["usernameMappings", "newPasswordMappings", "otpMappings"]);
        assert!(cfg.roles[0].required);
        assert!(!cfg.roles[2].required);
    }

    #[test]
    fn cli_overrides_win() {
        let cfg = load(
            "[logging]\nenabled = true\n",
            CliOverrides {
                no_log: true,
                allow_unassigned: true,
                ..CliOverrides::default()
            },
        )
        .expect("cfg");
        assert!(!cfg.logging.enabled);
        assert!(!cfg.readiness.require_unassigned_empty);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let cases = [
            "roles = []",
            "[[roles]]\nname = \"unassigned\"",
            "[[roles]]\nname = \"password\"",
            "[[roles]]\nname = \"a\"\n[[roles]]\nname = \"a\"",
            "[synthesis]\nusername_role = \"missing\"",
            "[password_options]\nlength = 0",
        ];
        for text in cases {
            let err = load(text, CliOverrides::default()).expect_err(text);
            assert!(matches!(err, CredmapError::InvalidConfig(_)), "{text}: {err}");
        }

        let err = load("roles = 3", CliOverrides::default()).expect_err("parse");
        assert!(matches!(err, CredmapError::ConfigParse(_)));
    }
}
