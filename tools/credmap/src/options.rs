//! Password generation options carried into the payload as
//! `passwordOptions`. The engine never interprets them; the table below
//! declares what each option means to the consumer of the payload.

use crate::errors::CredmapError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordOptions {
    pub length: u32,
    pub lowercase: bool,
    pub uppercase: bool,
    pub numbers: bool,
    pub symbols: bool,
    pub exclude_similar_characters: bool,
    pub exclude: String,
    pub strict: bool,
    pub symbols_to_use: String,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            length: 16,
            lowercase: true,
            uppercase: true,
            numbers: true,
            symbols: true,
            exclude_similar_characters: true,
            exclude: "Il1O0".to_string(),
            strict: true,
            symbols_to_use: "!@#$%^&*-_+=:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Number,
    Boolean,
    Text,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub effect: &'static str,
}

pub const OPTION_TABLE: [OptionSpec; 9] = [
    OptionSpec {
        name: "length",
        kind: OptionKind::Number,
        effect: "number of characters in the generated password",
    },
    OptionSpec {
        name: "lowercase",
        kind: OptionKind::Boolean,
        effect: "include lowercase letters",
    },
    OptionSpec {
        name: "uppercase",
        kind: OptionKind::Boolean,
        effect: "include uppercase letters",
    },
    OptionSpec {
        name: "numbers",
        kind: OptionKind::Boolean,
        effect: "include digits",
    },
    OptionSpec {
        name: "symbols",
        kind: OptionKind::Boolean,
        effect: "include symbols from symbolsToUse",
    },
    OptionSpec {
        name: "excludeSimilarCharacters",
        kind: OptionKind::Boolean,
        effect: "drop look-alike characters such as i, l, 1, o, 0",
    },
    OptionSpec {
        name: "exclude",
        kind: OptionKind::Text,
        effect: "characters never used",
    },
    OptionSpec {
        name: "strict",
        kind: OptionKind::Boolean,
        effect: "require at least one character from every enabled class",
    },
    OptionSpec {
        name: "symbolsToUse",
        kind: OptionKind::Text,
        effect: "symbol alphabet used when symbols is enabled",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Number(u32),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

/// Matches `symbolsToUse`, `symbols_to_use` and `SYMBOLS-TO-USE` alike.
pub fn lookup_option(name: &str) -> Option<&'static OptionSpec> {
    let wanted = normalize_name(name);
    OPTION_TABLE
        .iter()
        .find(|spec| normalize_name(spec.name) == wanted)
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl PasswordOptions {
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        let spec = lookup_option(name)?;
        let value = match spec.name {
            "length" => OptionValue::Number(self.length),
            "lowercase" => OptionValue::Boolean(self.lowercase),
            "uppercase" => OptionValue::Boolean(self.uppercase),
            "numbers" => OptionValue::Boolean(self.numbers),
            "symbols" => OptionValue::Boolean(self.symbols),
            "excludeSimilarCharacters" => OptionValue::Boolean(self.exclude_similar_characters),
            "exclude" => OptionValue::Text(self.exclude.clone()),
            "strict" => OptionValue::Boolean(self.strict),
            "symbolsToUse" => OptionValue::Text(self.symbols_to_use.clone()),
            _ => return None,
        };
        Some(value)
    }

    /// Parses `text` as the option's declared kind. On error nothing changes.
    pub fn set(&mut self, name: &str, text: &str) -> Result<&'static OptionSpec, CredmapError> {
        let spec = lookup_option(name)
            .ok_or_else(|| CredmapError::Option(format!("unknown option {name}")))?;
        let value = match spec.kind {
            OptionKind::Number => {
                let number = text.trim().parse::<u32>().map_err(|_| {
                    CredmapError::Option(format!("{} expects a number, got {text:?}", spec.name))
                })?;
                if number == 0 {
                    return Err(CredmapError::Option(format!(
                        "{} must be greater than zero",
                        spec.name
                    )));
                }
                OptionValue::Number(number)
            }
            OptionKind::Boolean => OptionValue::Boolean(parse_bool(text).ok_or_else(|| {
                CredmapError::Option(format!("{} expects true or false, got {text:?}", spec.name))
            })?),
            OptionKind::Text => OptionValue::Text(text.to_string()),
        };

        match (spec.name, value) {
            ("length", OptionValue::Number(v)) => self.length = v,
            ("lowercase", OptionValue::Boolean(v)) => self.lowercase = v,
            ("uppercase", OptionValue::Boolean(v)) => self.uppercase = v,
            ("numbers", OptionValue::Boolean(v)) => self.numbers = v,
            ("symbols", OptionValue::Boolean(v)) => self.symbols = v,
            ("excludeSimilarCharacters", OptionValue::Boolean(v)) => {
                self.exclude_similar_characters = v
            }
            ("exclude", OptionValue::Text(v)) => self.exclude = v,
            ("strict", OptionValue::Boolean(v)) => self.strict = v,
            ("symbolsToUse", OptionValue::Text(v)) => self.symbols_to_use = v,
            (name, _) => {
                return Err(CredmapError::Option(format!(
                    "option table entry {name} has no field"
                )))
            }
        }
        Ok(spec)
    }

    pub fn listing(&self) -> Vec<String> {
        OPTION_TABLE
            .iter()
            .filter_map(|spec| {
                self.get(spec.name).map(|value| {
                    format!("{}={} ({}: {})", spec.name, value, spec.kind.as_str(), spec.effect)
                })
            })
            .collect()
    }
}
