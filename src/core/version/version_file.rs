// ─── Version Metadata ───
// Typed view of a per-version document (vanilla or mod loader), plus the
// merge used for `inheritsFrom` chains.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::manifest::VersionType;
use super::rules::{Rule, RuleContext};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::required_java_for_minecraft_version;
use crate::core::maven::MavenArtifact;
use crate::core::store::ArtifactStore;

pub const MOJANG_LIBRARIES_URL: &str = "https://libraries.minecraft.net/";

const MAX_INHERITANCE_DEPTH: usize = 8;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<VersionType>,
    #[serde(default)]
    pub main_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    /// Legacy space-separated game arguments (pre-1.13).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

// ─── Arguments ───

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ArgumentValue {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentList,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ArgumentList {
    One(String),
    Many(Vec<String>),
}

/// Expand an argument list into plain tokens, dropping conditional entries
/// whose rules do not apply.
pub fn flatten_arguments(values: &[ArgumentValue], ctx: &RuleContext) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        match value {
            ArgumentValue::Plain(arg) => out.push(arg.clone()),
            ArgumentValue::Conditional { rules, value } => {
                if !ctx.allows(Some(rules)) {
                    continue;
                }
                match value {
                    ArgumentList::One(arg) => out.push(arg.clone()),
                    ArgumentList::Many(args) => out.extend(args.iter().cloned()),
                }
            }
        }
    }
    out
}

// ─── Libraries ───

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// Repository base for loader libraries that carry no `downloads` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// OS name → classifier, e.g. `{"linux": "natives-linux"}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LibraryArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// One concrete file a library contributes, relative to `libraries/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub path: String,
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

impl LibraryEntry {
    pub fn artifact(&self) -> LauncherResult<MavenArtifact> {
        MavenArtifact::parse(&self.name)
    }

    pub fn is_applicable(&self, ctx: &RuleContext) -> bool {
        ctx.allows(self.rules.as_deref())
    }

    /// The jar that goes on the classpath, if the library has one.
    ///
    /// Natives-only entries (a `downloads` block without `artifact`, or a
    /// bare `natives` map) contribute nothing here.
    pub fn main_file(&self) -> Option<LibraryFile> {
        match &self.downloads {
            Some(downloads) => {
                let artifact = downloads.artifact.as_ref()?;
                let path = match &artifact.path {
                    Some(path) => path.clone(),
                    None => self.artifact().ok()?.relative_path(),
                };
                Some(LibraryFile {
                    path,
                    url: non_empty(&artifact.url),
                    sha1: artifact.sha1.clone(),
                    size: artifact.size,
                })
            }
            None if self.natives.is_some() => None,
            None => {
                let artifact = self.artifact().ok()?;
                let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES_URL);
                Some(LibraryFile {
                    path: artifact.relative_path(),
                    url: Some(artifact.url(repo)),
                    sha1: self.sha1.clone(),
                    size: self.size,
                })
            }
        }
    }

    /// Classifier named by the legacy `natives` map for this platform.
    pub fn native_classifier(&self, ctx: &RuleContext) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(&ctx.os_name)
            .map(|classifier| classifier.replace("${arch}", ctx.arch_bits()))
    }

    /// Native archive selected through the legacy `natives` map.
    pub fn native_file(&self, ctx: &RuleContext) -> Option<LibraryFile> {
        let classifier = self.native_classifier(ctx)?;

        let declared = self
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(&classifier));

        let artifact = self.artifact().ok()?.with_classifier(&classifier);
        match declared {
            Some(download) => Some(LibraryFile {
                path: download
                    .path
                    .clone()
                    .unwrap_or_else(|| artifact.relative_path()),
                url: non_empty(&download.url),
                sha1: download.sha1.clone(),
                size: download.size,
            }),
            None => {
                let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES_URL);
                Some(LibraryFile {
                    path: artifact.relative_path(),
                    url: Some(artifact.url(repo)),
                    sha1: None,
                    size: None,
                })
            }
        }
    }
}

fn non_empty(url: &str) -> Option<String> {
    if url.trim().is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

// ─── Metadata helpers ───

impl VersionMetadata {
    pub fn from_json(raw: &str) -> LauncherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LauncherError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_json(&raw)
    }

    /// Game version this document ultimately runs.
    pub fn game_version(&self) -> &str {
        self.inherits_from.as_deref().unwrap_or(&self.id)
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|j| j.major_version)
            .unwrap_or_else(|| required_java_for_minecraft_version(self.game_version()))
    }

    pub fn asset_index_id(&self) -> Option<&str> {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
    }

    pub fn applicable_libraries<'a>(
        &'a self,
        ctx: &'a RuleContext,
    ) -> impl Iterator<Item = &'a LibraryEntry> + 'a {
        self.libraries.iter().filter(move |lib| lib.is_applicable(ctx))
    }

    /// Game argument template with conditional entries resolved.
    pub fn game_arguments(&self, ctx: &RuleContext) -> Vec<String> {
        if let Some(legacy) = &self.minecraft_arguments {
            return legacy.split_whitespace().map(str::to_string).collect();
        }
        match &self.arguments {
            Some(args) => flatten_arguments(&args.game, ctx),
            None => Vec::new(),
        }
    }

    /// JVM argument template; legacy documents carry none.
    pub fn jvm_arguments(&self, ctx: &RuleContext) -> Vec<String> {
        match &self.arguments {
            Some(args) => flatten_arguments(&args.jvm, ctx),
            None => Vec::new(),
        }
    }

    /// Overlay `self` (a child such as a loader profile) on `parent`.
    ///
    /// Scalars from the child win. Library lists are concatenated with the
    /// child's first so its versions take precedence after de-duplication.
    /// Modern argument lists are concatenated parent first; a legacy
    /// `minecraftArguments` string on the child replaces the parent's.
    pub fn merged_onto(&self, parent: &VersionMetadata) -> VersionMetadata {
        let arguments = match (&parent.arguments, &self.arguments) {
            (None, None) => None,
            (Some(p), None) => Some(p.clone()),
            (None, Some(c)) => Some(c.clone()),
            (Some(p), Some(c)) => Some(Arguments {
                game: p.game.iter().chain(c.game.iter()).cloned().collect(),
                jvm: p.jvm.iter().chain(c.jvm.iter()).cloned().collect(),
            }),
        };

        let main_class = if self.main_class.is_empty() {
            parent.main_class.clone()
        } else {
            self.main_class.clone()
        };

        VersionMetadata {
            id: self.id.clone(),
            version_type: self.version_type.or(parent.version_type),
            main_class,
            inherits_from: parent.inherits_from.clone(),
            arguments,
            minecraft_arguments: self
                .minecraft_arguments
                .clone()
                .or_else(|| parent.minecraft_arguments.clone()),
            libraries: self
                .libraries
                .iter()
                .chain(parent.libraries.iter())
                .cloned()
                .collect(),
            downloads: self.downloads.clone().or_else(|| parent.downloads.clone()),
            asset_index: self
                .asset_index
                .clone()
                .or_else(|| parent.asset_index.clone()),
            assets: self.assets.clone().or_else(|| parent.assets.clone()),
            java_version: self
                .java_version
                .clone()
                .or_else(|| parent.java_version.clone()),
            compliance_level: self.compliance_level.or(parent.compliance_level),
            release_time: self
                .release_time
                .clone()
                .or_else(|| parent.release_time.clone()),
        }
    }

    /// Load `versions/<id>/<id>.json` and fold in every `inheritsFrom` parent.
    pub async fn resolve_inherited(store: &ArtifactStore, version_id: &str) -> LauncherResult<Self> {
        let mut current = Self::load(&store.version_json_path(version_id)).await?;

        for _ in 0..MAX_INHERITANCE_DEPTH {
            let Some(parent_id) = current.inherits_from.clone() else {
                return Ok(current);
            };
            debug!("Merging {} onto parent {}", current.id, parent_id);
            let parent = Self::load(&store.version_json_path(&parent_id)).await?;
            current = current.merged_onto(&parent);
        }

        if current.inherits_from.is_some() {
            return Err(LauncherError::Loader(format!(
                "inheritsFrom chain of {version_id} exceeds {MAX_INHERITANCE_DEPTH} levels"
            )));
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linux() -> RuleContext {
        RuleContext::for_platform("linux", "x86_64")
    }

    #[test]
    fn conditional_arguments_respect_rules() {
        let parsed: VersionMetadata = serde_json::from_value(json!({
            "id": "test",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "${auth_player_name}",
                    {
                        "rules": [{"action": "allow", "features": {"is_demo_user": true}}],
                        "value": "--demo"
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": "linux"}}],
                        "value": ["--linux-only", "yes"]
                    }
                ],
                "jvm": [
                    {
                        "rules": [{"action": "allow", "os": {"name": "osx"}}],
                        "value": ["-XstartOnFirstThread"]
                    },
                    "-cp",
                    "${classpath}"
                ]
            }
        }))
        .unwrap();

        let game = parsed.game_arguments(&linux());
        assert_eq!(
            game,
            vec!["--username", "${auth_player_name}", "--linux-only", "yes"]
        );
        assert_eq!(parsed.jvm_arguments(&linux()), vec!["-cp", "${classpath}"]);
    }

    #[test]
    fn legacy_arguments_split_on_whitespace() {
        let parsed: VersionMetadata = serde_json::from_value(json!({
            "id": "1.8.9",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --version ${version_name}"
        }))
        .unwrap();
        assert_eq!(parsed.game_arguments(&linux()).len(), 4);
        assert!(parsed.jvm_arguments(&linux()).is_empty());
    }

    #[test]
    fn legacy_natives_map_selects_classifier_download() {
        let lib: LibraryEntry = serde_json::from_value(json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4-nightly-20150209",
            "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4-nightly-20150209/lwjgl-platform-2.9.4-nightly-20150209-natives-linux.jar",
                        "sha1": "931074f46c795d2f7b30ed6395df5715cfd7675b",
                        "size": 578680,
                        "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/lwjgl-platform/2.9.4-nightly-20150209/lwjgl-platform-2.9.4-nightly-20150209-natives-linux.jar"
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(lib.main_file(), None);
        let native = lib.native_file(&linux()).unwrap();
        assert!(native.path.ends_with("natives-linux.jar"));
        assert_eq!(native.size, Some(578680));

        let win32 = RuleContext::for_platform("windows", "x86");
        assert_eq!(
            lib.native_classifier(&win32).as_deref(),
            Some("natives-windows-32")
        );
    }

    #[test]
    fn loader_library_without_downloads_uses_repository_url() {
        let lib: LibraryEntry = serde_json::from_value(json!({
            "name": "net.fabricmc:fabric-loader:0.14.21",
            "url": "https://maven.fabricmc.net/"
        }))
        .unwrap();
        let file = lib.main_file().unwrap();
        assert_eq!(
            file.path,
            "net/fabricmc/fabric-loader/0.14.21/fabric-loader-0.14.21.jar"
        );
        assert_eq!(
            file.url.as_deref(),
            Some("https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.14.21/fabric-loader-0.14.21.jar")
        );
    }

    #[test]
    fn child_overrides_parent_and_prepends_libraries() {
        let parent: VersionMetadata = serde_json::from_value(json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": [{"name": "org.ow2.asm:asm:9.3"}],
            "arguments": {"game": ["--parent"], "jvm": ["-Dparent=1"]},
            "assetIndex": {"id": "5", "url": "https://example.invalid/5.json"}
        }))
        .unwrap();
        let child: VersionMetadata = serde_json::from_value(json!({
            "id": "fabric-loader-0.14.21-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "libraries": [{"name": "org.ow2.asm:asm:9.6", "url": "https://maven.fabricmc.net/"}],
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]}
        }))
        .unwrap();

        let merged = child.merged_onto(&parent);
        assert_eq!(merged.id, "fabric-loader-0.14.21-1.20.1");
        assert_eq!(merged.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
        assert_eq!(merged.inherits_from, None);
        assert_eq!(merged.libraries[0].name, "org.ow2.asm:asm:9.6");
        assert_eq!(merged.libraries.len(), 2);
        assert_eq!(merged.jvm_arguments(&linux()).len(), 2);
        assert_eq!(merged.asset_index_id(), Some("5"));
    }

    #[tokio::test]
    async fn resolve_inherited_walks_parent_documents() {
        let root = std::env::temp_dir().join(format!("launcher-core-inherit-{}", std::process::id()));
        let store = ArtifactStore::new(&root);
        for (id, doc) in [
            (
                "1.20.1",
                json!({"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main",
                       "javaVersion": {"majorVersion": 17}}),
            ),
            (
                "1.20.1-forge-47.2.0",
                json!({"id": "1.20.1-forge-47.2.0", "inheritsFrom": "1.20.1",
                       "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher"}),
            ),
        ] {
            let path = store.version_json_path(id);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, doc.to_string()).unwrap();
        }

        let resolved = VersionMetadata::resolve_inherited(&store, "1.20.1-forge-47.2.0")
            .await
            .unwrap();
        assert_eq!(resolved.main_class, "cpw.mods.bootstraplauncher.BootstrapLauncher");
        assert_eq!(resolved.required_java_major(), 17);

        let _ = std::fs::remove_dir_all(&root);
    }
}
