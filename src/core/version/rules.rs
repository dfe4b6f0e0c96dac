// ─── Rules ───
// Evaluates the allow/disallow rule lists attached to libraries and
// conditional arguments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Regex on the OS version. Not evaluated; no current document depends on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Platform and feature flags that rules are evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    pub os_name: String,
    pub os_arch: String,
    pub features: HashMap<String, bool>,
}

impl Default for RuleContext {
    fn default() -> Self {
        Self::current()
    }
}

impl RuleContext {
    pub fn current() -> Self {
        Self {
            os_name: current_os_name().to_string(),
            os_arch: current_os_arch().to_string(),
            features: HashMap::new(),
        }
    }

    pub fn for_platform(os_name: &str, os_arch: &str) -> Self {
        Self {
            os_name: os_name.to_string(),
            os_arch: os_arch.to_string(),
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
        self.features.insert(name.to_string(), enabled);
        self
    }

    /// Evaluate a rule list.
    ///
    /// - No rules → allowed.
    /// - Otherwise start disallowed and let every matching rule set the
    ///   state to its action; the last match wins.
    pub fn allows(&self, rules: Option<&[Rule]>) -> bool {
        let rules = match rules {
            Some(r) if !r.is_empty() => r,
            _ => return true,
        };

        let mut allowed = false;
        for rule in rules {
            if self.matches(rule) {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    fn matches(&self, rule: &Rule) -> bool {
        if let Some(os) = &rule.os {
            if let Some(name) = &os.name {
                if name != &self.os_name {
                    return false;
                }
            }
            if let Some(arch) = &os.arch {
                if arch != &self.os_arch {
                    return false;
                }
            }
        }

        if let Some(features) = &rule.features {
            for (feature, expected) in features {
                let actual = self.features.get(feature).copied().unwrap_or(false);
                if actual != *expected {
                    return false;
                }
            }
        }

        true
    }

    /// Value substituted for `${arch}` in legacy native classifiers.
    pub fn arch_bits(&self) -> &'static str {
        match self.os_arch.as_str() {
            "x86" | "arm32" => "32",
            _ => "64",
        }
    }
}

/// Get the OS name used by version documents for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

pub fn current_os_arch() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else if cfg!(target_arch = "arm") {
        "arm32"
    } else {
        "x86_64"
    }
}
