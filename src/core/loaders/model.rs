use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModLoaderType {
    Forge,
    Fabric,
    Quilt,
}

impl ModLoaderType {
    pub const ALL: [ModLoaderType; 3] = [
        ModLoaderType::Forge,
        ModLoaderType::Fabric,
        ModLoaderType::Quilt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModLoaderType::Forge => "forge",
            ModLoaderType::Fabric => "fabric",
            ModLoaderType::Quilt => "quilt",
        }
    }
}

impl fmt::Display for ModLoaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One installable loader build for one game version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModLoaderDescriptor {
    #[serde(rename = "type")]
    pub loader_type: ModLoaderType,
    pub version: String,
    pub game_version: String,
    pub stable: bool,
    pub recommended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_url: Option<String>,
}

impl ModLoaderDescriptor {
    pub fn new(loader_type: ModLoaderType, game_version: &str, version: &str) -> Self {
        Self {
            loader_type,
            version: version.to_string(),
            game_version: game_version.to_string(),
            stable: true,
            recommended: false,
            installer_url: None,
        }
    }

    /// Id of the version document the installation produces.
    pub fn installed_version_id(&self) -> String {
        installed_version_id(self.loader_type, &self.game_version, &self.version)
    }
}

/// `fabric-loader-<loader>-<game>`, `quilt-loader-<loader>-<game>` or
/// `<game>-forge-<loader>`.
pub fn installed_version_id(loader_type: ModLoaderType, game_version: &str, loader_version: &str) -> String {
    match loader_type {
        ModLoaderType::Fabric => format!("fabric-loader-{loader_version}-{game_version}"),
        ModLoaderType::Quilt => format!("quilt-loader-{loader_version}-{game_version}"),
        ModLoaderType::Forge => format!("{game_version}-forge-{loader_version}"),
    }
}

/// Recognize the loader behind an installed version document from its
/// main class. Bare launchwrapper is shared with other tweakers, so it only
/// counts as Forge when the id says so.
pub fn loader_type_from_main_class(main_class: &str, version_id: &str) -> Option<ModLoaderType> {
    if main_class.starts_with("net.fabricmc.loader") {
        Some(ModLoaderType::Fabric)
    } else if main_class.starts_with("org.quiltmc.loader") {
        Some(ModLoaderType::Quilt)
    } else if main_class.starts_with("cpw.mods.bootstraplauncher")
        || main_class.starts_with("cpw.mods.modlauncher")
        || main_class.starts_with("net.minecraftforge.")
    {
        Some(ModLoaderType::Forge)
    } else if main_class == "net.minecraft.launchwrapper.Launch"
        && version_id.to_ascii_lowercase().contains("forge")
    {
        Some(ModLoaderType::Forge)
    } else {
        None
    }
}

/// Split an installed version id back into (game version, loader version).
pub fn parse_installed_version_id(
    loader_type: ModLoaderType,
    version_id: &str,
    inherits_from: Option<&str>,
) -> Option<(String, String)> {
    let prefixed = |prefix: &str| -> Option<(String, String)> {
        let rest = version_id.strip_prefix(prefix)?;
        match inherits_from {
            Some(game) => {
                let loader = rest.strip_suffix(&format!("-{game}"))?;
                Some((game.to_string(), loader.to_string()))
            }
            None => {
                let (loader, game) = rest.split_once('-')?;
                Some((game.to_string(), loader.to_string()))
            }
        }
    };

    match loader_type {
        ModLoaderType::Fabric => prefixed("fabric-loader-"),
        ModLoaderType::Quilt => prefixed("quilt-loader-"),
        ModLoaderType::Forge => {
            let (game, rest) = version_id.split_once("-forge")?;
            let game = inherits_from.unwrap_or(game);
            let loader = rest.trim_start_matches('-');
            // Older installers repeat the game version: `1.12.2-forge1.12.2-14.23.5.2847`.
            let loader = loader
                .strip_prefix(&format!("{game}-"))
                .unwrap_or(loader);
            if loader.is_empty() {
                return None;
            }
            Some((game.to_string(), loader.to_string()))
        }
    }
}

// ─── Install progress ───

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    Preparing,
    Downloading,
    Installing,
    Verifying,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallProgress {
    pub loader_type: ModLoaderType,
    pub loader_version: String,
    pub game_version: String,
    pub stage: InstallStage,
    pub percentage: u8,
    pub message: String,
}

pub type InstallProgressSender = mpsc::UnboundedSender<InstallProgress>;

/// Emits [`InstallProgress`] for one installation.
pub struct InstallReporter<'a> {
    descriptor: &'a ModLoaderDescriptor,
    sender: Option<&'a InstallProgressSender>,
}

impl<'a> InstallReporter<'a> {
    pub fn new(descriptor: &'a ModLoaderDescriptor, sender: Option<&'a InstallProgressSender>) -> Self {
        Self { descriptor, sender }
    }

    pub fn report(&self, stage: InstallStage, percentage: u8, message: impl Into<String>) {
        let Some(tx) = self.sender else {
            return;
        };
        let _ = tx.send(InstallProgress {
            loader_type: self.descriptor.loader_type,
            loader_version: self.descriptor.version.clone(),
            game_version: self.descriptor.game_version.clone(),
            stage,
            percentage: percentage.min(100),
            message: message.into(),
        });
    }
}
