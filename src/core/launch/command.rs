// ─── Launch Command Builder ───
// Turns a profile, its merged version document and the session into the
// exact java invocation. Pure apart from the file-presence probe.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::arguments::{
    contains_flag, ensure_arg_pair, strip_option, strip_system_properties, ArgumentValues,
};
use super::classpath::{
    get_classpath_separator, join_classpath, prioritize_bootstrap_entries, resolve_classpath,
    safe_path_str,
};
use crate::core::auth::Credentials;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::required_java_for_minecraft_version;
use crate::core::loaders::ModLoaderType;
use crate::core::profile::Profile;
use crate::core::store::{ArtifactStore, FileProbe};
use crate::core::version::ordering::{compare_releases, parse_release};
use crate::core::version::{RuleContext, VersionMetadata};

/// Last release whose LWJGL 2 natives loader needs the extra library-path
/// properties. Snapshots are decided from the document shape instead.
pub const LAST_LEGACY_LWJGL_RELEASE: [u32; 3] = [1, 12, 2];

pub const MIN_MEMORY_FLOOR_MB: u32 = 512;

const FABRIC_MAIN_CLASS: &str = "net.fabricmc.loader.impl.launch.knot.KnotClient";
const QUILT_MAIN_CLASS: &str = "org.quiltmc.loader.impl.launch.knot.KnotClient";
const FORGE_LAUNCHWRAPPER_MAIN_CLASS: &str = "net.minecraft.launchwrapper.Launch";
const FORGE_MODLAUNCHER_MAIN_CLASS: &str = "cpw.mods.modlauncher.Launcher";
const FORGE_BOOTSTRAP_MAIN_CLASS: &str = "cpw.mods.bootstraplauncher.BootstrapLauncher";
const FORGE_TWEAK_CLASS: &str = "net.minecraftforge.fml.common.launcher.FMLTweaker";

const CLASSPATH_FLAGS: [&str; 3] = ["-cp", "-classpath", "--class-path"];
const MANAGED_PROPERTIES: [&str; 5] = [
    "java.library.path",
    "org.lwjgl.librarypath",
    "net.java.games.input.librarypath",
    "minecraft.launcher.brand",
    "minecraft.launcher.version",
];

// ─── Command value ───

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl LaunchCommand {
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.executable);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env);
        cmd
    }

    /// Copy-pasteable rendering for debug logs.
    pub fn display_for_logs(&self) -> String {
        std::iter::once(shell_escape(&self.executable.to_string_lossy()))
            .chain(self.args.iter().map(|arg| shell_escape(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Position of the main class, which splits JVM from game arguments.
    pub fn main_class_index(&self, main_class: &str) -> Option<usize> {
        self.args.iter().position(|a| a == main_class)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

// ─── Resolved paths ───

/// Locations the command points at. Computed by the caller, never probed
/// here except through [`FileProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub java_executable: PathBuf,
    pub game_dir: PathBuf,
    pub store: ArtifactStore,
    pub natives_dir: PathBuf,
    pub client_jar: PathBuf,
}

impl ResolvedPaths {
    pub fn for_profile(store: &ArtifactStore, profile: &Profile, java_executable: PathBuf) -> Self {
        Self {
            java_executable,
            game_dir: profile.install_dir.clone(),
            store: store.clone(),
            natives_dir: store.natives_dir(&profile.launch_version_id()),
            client_jar: store.version_jar_path(&profile.version_id),
        }
    }
}

// ─── Version eras ───

/// Whether `game_version` predates the LWJGL 3 natives loader.
pub fn uses_legacy_lwjgl(game_version: &str, metadata: &VersionMetadata) -> bool {
    if let Some(release) = parse_release(game_version) {
        return compare_releases(&release, &LAST_LEGACY_LWJGL_RELEASE) != Ordering::Greater;
    }
    if metadata.compliance_level.unwrap_or(0) >= 1 {
        return false;
    }
    metadata.arguments.is_none()
}

/// Java major the game needs; loader documents often omit `javaVersion`.
pub fn required_java_major(profile: &Profile, metadata: &VersionMetadata) -> u32 {
    metadata
        .java_version
        .as_ref()
        .map(|j| j.major_version)
        .unwrap_or_else(|| required_java_for_minecraft_version(&profile.version_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForgeEra {
    LaunchWrapper,
    ModLauncher,
    BootstrapLauncher,
}

fn forge_era(game_version: &str, main_class: &str) -> ForgeEra {
    if main_class.starts_with("net.minecraft.launchwrapper.") {
        return ForgeEra::LaunchWrapper;
    }
    if main_class == FORGE_BOOTSTRAP_MAIN_CLASS {
        return ForgeEra::BootstrapLauncher;
    }
    if main_class == FORGE_MODLAUNCHER_MAIN_CLASS {
        return ForgeEra::ModLauncher;
    }
    match parse_release(game_version) {
        Some(v) if compare_releases(&v, &[1, 12, 2]) != Ordering::Greater => ForgeEra::LaunchWrapper,
        Some(v) if compare_releases(&v, &[1, 17]) == Ordering::Less => ForgeEra::ModLauncher,
        _ => ForgeEra::BootstrapLauncher,
    }
}

fn is_forge_main_class(main_class: &str) -> bool {
    main_class.starts_with("net.minecraftforge.")
        || main_class.starts_with("cpw.mods.")
        || main_class.starts_with("net.minecraft.launchwrapper.")
}

fn modern_forge_jvm_arg_pairs() -> [(&'static str, &'static str); 12] {
    [
        ("--add-modules", "ALL-SYSTEM"),
        ("--add-opens", "java.base/java.util.jar=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.lang=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.util=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.lang.invoke=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.lang.reflect=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.nio.file=ALL-UNNAMED"),
        ("--add-opens", "java.base/sun.security.util=ALL-UNNAMED"),
        ("--add-exports", "java.base/sun.security.action=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.io=ALL-UNNAMED"),
        ("--add-opens", "java.base/java.net=ALL-UNNAMED"),
        ("--add-opens", "java.base/sun.nio.ch=ALL-UNNAMED"),
    ]
}

/// Main class plus the loader-specific pieces of the command.
#[derive(Debug, Default)]
struct LoaderPlan {
    main_class: String,
    jvm_properties: Vec<String>,
    jvm_pairs: Vec<(&'static str, &'static str)>,
    game_pairs: Vec<(&'static str, String)>,
    bootstrap_first: bool,
}

fn plan_loader(profile: &Profile, metadata: &VersionMetadata, java_major: u32) -> LoaderPlan {
    let declared = metadata.main_class.as_str();
    let Some(loader) = &profile.mod_loader else {
        return LoaderPlan {
            main_class: declared.to_string(),
            ..LoaderPlan::default()
        };
    };

    match loader.loader_type {
        ModLoaderType::Fabric => LoaderPlan {
            main_class: if declared.starts_with("net.fabricmc.") {
                declared.to_string()
            } else {
                FABRIC_MAIN_CLASS.to_string()
            },
            jvm_properties: vec!["-Dfabric.development=false".to_string()],
            ..LoaderPlan::default()
        },
        ModLoaderType::Quilt => LoaderPlan {
            main_class: if declared.starts_with("org.quiltmc.") {
                declared.to_string()
            } else {
                QUILT_MAIN_CLASS.to_string()
            },
            jvm_properties: vec!["-Dloader.development=false".to_string()],
            ..LoaderPlan::default()
        },
        ModLoaderType::Forge => {
            let era = forge_era(&profile.version_id, declared);
            let main_class = if is_forge_main_class(declared) {
                declared.to_string()
            } else {
                match era {
                    ForgeEra::LaunchWrapper => FORGE_LAUNCHWRAPPER_MAIN_CLASS,
                    ForgeEra::ModLauncher => FORGE_MODLAUNCHER_MAIN_CLASS,
                    ForgeEra::BootstrapLauncher => FORGE_BOOTSTRAP_MAIN_CLASS,
                }
                .to_string()
            };

            let mut plan = LoaderPlan {
                main_class,
                jvm_properties: vec![
                    "-Dfml.ignoreInvalidMinecraftCertificates=true".to_string(),
                    "-Dfml.ignorePatchDiscrepancies=true".to_string(),
                ],
                bootstrap_first: era != ForgeEra::LaunchWrapper,
                ..LoaderPlan::default()
            };
            if java_major >= 17 && era != ForgeEra::LaunchWrapper {
                plan.jvm_pairs = modern_forge_jvm_arg_pairs().to_vec();
            }
            match era {
                ForgeEra::LaunchWrapper => {
                    plan.game_pairs
                        .push(("--tweakClass", FORGE_TWEAK_CLASS.to_string()));
                }
                ForgeEra::ModLauncher | ForgeEra::BootstrapLauncher => {
                    plan.game_pairs
                        .push(("--fml.mcVersion", profile.version_id.clone()));
                    if !loader.version.trim().is_empty() {
                        plan.game_pairs
                            .push(("--fml.forgeVersion", loader.version.clone()));
                    }
                }
            }
            plan
        }
    }
}

// ─── Builder ───

pub struct CommandBuilder {
    probe: Arc<dyn FileProbe>,
    rules: RuleContext,
    launcher_name: String,
    launcher_version: String,
}

impl CommandBuilder {
    pub fn new(probe: Arc<dyn FileProbe>, rules: RuleContext) -> Self {
        Self {
            probe,
            rules,
            launcher_name: env!("CARGO_PKG_NAME").to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_launcher_identity(mut self, name: &str, version: &str) -> Self {
        self.launcher_name = name.to_string();
        self.launcher_version = version.to_string();
        self
    }

    pub fn rules(&self) -> &RuleContext {
        &self.rules
    }

    /// Build the command for `profile` from its merged version document.
    ///
    /// Every precondition is checked before failing, so the returned
    /// [`LauncherError::Validation`] lists all of them.
    pub fn build(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
        credentials: &Credentials,
        paths: &ResolvedPaths,
    ) -> LauncherResult<LaunchCommand> {
        let rules = self
            .rules
            .clone()
            .with_feature("has_custom_resolution", profile.resolution.is_some());

        let mut classpath = resolve_classpath(metadata, &paths.store, &paths.client_jar, &rules);
        let java_major = required_java_major(profile, metadata);
        let plan = plan_loader(profile, metadata, java_major);

        let mut violations = Vec::new();
        if paths.java_executable.as_os_str().is_empty() {
            violations.push("Java executable path is empty".to_string());
        }
        if profile.min_memory_mb < MIN_MEMORY_FLOOR_MB {
            violations.push(format!(
                "Minimum memory {}MB is below {}MB",
                profile.min_memory_mb, MIN_MEMORY_FLOOR_MB
            ));
        }
        if profile.min_memory_mb > profile.max_memory_mb {
            violations.push(format!(
                "Minimum memory {}MB exceeds maximum memory {}MB",
                profile.min_memory_mb, profile.max_memory_mb
            ));
        }
        for entry in &classpath {
            if !self.probe.exists(entry) {
                violations.push(format!("Required file is missing: {}", entry.display()));
            }
        }
        if plan.main_class.trim().is_empty() {
            violations.push(format!("Version {} declares no main class", metadata.id));
        }
        if !violations.is_empty() {
            return Err(LauncherError::validation(violations));
        }

        if plan.bootstrap_first {
            prioritize_bootstrap_entries(&mut classpath);
        }
        let classpath = join_classpath(&classpath);
        let values = self.argument_values(profile, metadata, credentials, paths, &classpath);
        let legacy = uses_legacy_lwjgl(&profile.version_id, metadata);
        let natives = safe_path_str(&paths.natives_dir);

        // ── JVM arguments ──
        let mut jvm = values.substitute(&metadata.jvm_arguments(&rules));
        strip_option(&mut jvm, &CLASSPATH_FLAGS);
        strip_system_properties(&mut jvm, &MANAGED_PROPERTIES);
        if jvm.is_empty() && rules.os_name == "osx" {
            jvm.push("-XstartOnFirstThread".to_string());
        }
        jvm.push(format!("-Djava.library.path={}", natives));
        if legacy {
            jvm.push(format!("-Dorg.lwjgl.librarypath={}", natives));
            jvm.push(format!("-Dnet.java.games.input.librarypath={}", natives));
        }
        jvm.push(format!("-Dminecraft.launcher.brand={}", self.launcher_name));
        jvm.push(format!("-Dminecraft.launcher.version={}", self.launcher_version));
        for prop in &plan.jvm_properties {
            if !contains_flag(&jvm, prop) {
                jvm.push(prop.clone());
            }
        }
        for (flag, value) in &plan.jvm_pairs {
            ensure_arg_pair(&mut jvm, flag, value);
        }
        jvm.push("-cp".to_string());
        jvm.push(classpath);
        jvm.push(format!("-Xms{}M", profile.min_memory_mb));
        jvm.push(format!("-Xmx{}M", profile.max_memory_mb));
        jvm.extend(profile.extra_jvm_args.iter().cloned());

        // ── Game arguments ──
        let mut game = values.substitute(&metadata.game_arguments(&rules));
        for (flag, value) in &plan.game_pairs {
            if !contains_flag(&game, flag) {
                game.push(flag.to_string());
                game.push(value.clone());
            }
        }
        if let Some(resolution) = profile.resolution {
            if !contains_flag(&game, "--width") {
                game.push("--width".to_string());
                game.push(resolution.width.to_string());
                game.push("--height".to_string());
                game.push(resolution.height.to_string());
            }
        }

        let mut args = jvm;
        args.push(plan.main_class.clone());
        args.extend(game);

        let mut env = BTreeMap::new();
        if let Some(var) = native_library_env_var() {
            env.insert(var.to_string(), prepend_env_path(var, &natives));
        }

        let command = LaunchCommand {
            executable: paths.java_executable.clone(),
            args,
            working_dir: paths.game_dir.clone(),
            env,
        };
        debug!(
            "Built launch command for profile {} (main class {}, legacy natives: {})",
            profile.id, plan.main_class, legacy
        );
        Ok(command)
    }

    fn argument_values(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
        credentials: &Credentials,
        paths: &ResolvedPaths,
        classpath: &str,
    ) -> ArgumentValues {
        let assets_root = paths.store.assets_dir();
        let index_name = metadata.asset_index_id().unwrap_or("legacy").to_string();
        let game_assets = if index_name == "legacy" || index_name == "pre-1.6" {
            assets_root.join("virtual").join(&index_name)
        } else {
            assets_root.clone()
        };
        let version_type = metadata
            .version_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "release".to_string());

        let mut values = ArgumentValues::new();
        values
            .set("auth_player_name", credentials.player_name.clone())
            .set("auth_uuid", credentials.player_uuid.clone())
            .set("auth_access_token", credentials.access_token.clone())
            .set(
                "auth_session",
                format!(
                    "token:{}:{}",
                    credentials.access_token, credentials.player_uuid
                ),
            )
            .set("auth_xuid", credentials.xuid())
            .set("clientid", credentials.client_id())
            .set("user_type", credentials.user_type.clone())
            .set("user_properties", "{}")
            .set("version_name", metadata.id.clone())
            .set("version_type", version_type)
            .set("game_directory", safe_path_str(&paths.game_dir))
            .set("assets_root", safe_path_str(&assets_root))
            .set("game_assets", safe_path_str(&game_assets))
            .set("assets_index_name", index_name)
            .set("natives_directory", safe_path_str(&paths.natives_dir))
            .set(
                "library_directory",
                safe_path_str(&paths.store.libraries_dir()),
            )
            .set("classpath", classpath)
            .set("classpath_separator", get_classpath_separator())
            .set("launcher_name", self.launcher_name.clone())
            .set("launcher_version", self.launcher_version.clone());
        if let Some(resolution) = profile.resolution {
            values
                .set("resolution_width", resolution.width.to_string())
                .set("resolution_height", resolution.height.to_string());
        }
        values
    }
}

fn native_library_env_var() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("PATH")
    } else if cfg!(target_os = "linux") {
        Some("LD_LIBRARY_PATH")
    } else if cfg!(target_os = "macos") {
        Some("DYLD_LIBRARY_PATH")
    } else {
        None
    }
}

/// `value` ahead of the current contents of `var_name`.
fn prepend_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::Resolution;
    use crate::core::testing::CountingProbe;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            access_token: "tok".into(),
            expires_at: Utc::now() + Duration::hours(1),
            player_name: "Steve".into(),
            player_uuid: "uuid-1".into(),
            user_type: "msa".into(),
            xuid: None,
            client_id: None,
        }
    }

    fn builder() -> CommandBuilder {
        CommandBuilder::new(
            Arc::new(CountingProbe::everything_present()),
            RuleContext::for_platform("linux", "x86_64"),
        )
        .with_launcher_identity("test-launcher", "1.0")
    }

    fn paths(profile: &Profile) -> ResolvedPaths {
        ResolvedPaths::for_profile(
            &ArtifactStore::new("/data"),
            profile,
            PathBuf::from("/jvm/bin/java"),
        )
    }

    fn legacy_metadata(id: &str) -> VersionMetadata {
        serde_json::from_value(json!({
            "id": id,
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --session ${auth_session} --version ${version_name} --gameDir ${game_directory} --assetIndex ${assets_index_name} --userProperties ${user_properties}",
            "assets": "1.12",
            "libraries": [{"name": "com.mojang:authlib:1.5.25", "downloads": {"artifact": {
                "path": "com/mojang/authlib/1.5.25/authlib-1.5.25.jar", "url": "https://x"}}}]
        }))
        .unwrap()
    }

    fn modern_metadata(id: &str) -> VersionMetadata {
        serde_json::from_value(json!({
            "id": id,
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "complianceLevel": 1,
            "assetIndex": {"id": "5", "sha1": "a", "size": 1, "totalSize": 1, "url": "https://x"},
            "arguments": {
                "game": ["--username", "${auth_player_name}", "--uuid", "${auth_uuid}",
                         "--accessToken", "${auth_access_token}", "--xuid", "${auth_xuid}",
                         "--clientId", "${clientid}", "--assetsDir", "${assets_root}",
                         "--quickPlayPath", "${quickPlayPath}",
                         {"rules": [{"action": "allow", "features": {"has_custom_resolution": true}}],
                          "value": ["--width", "${resolution_width}", "--height", "${resolution_height}"]}],
                "jvm": ["-Djava.library.path=${natives_directory}",
                        "-Dminecraft.launcher.brand=${launcher_name}",
                        "-cp", "${classpath}"]
            },
            "libraries": [{"name": "org.lwjgl:lwjgl:3.3.1", "downloads": {"artifact": {
                "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar", "url": "https://x"}}}]
        }))
        .unwrap()
    }

    fn count_prefix(command: &LaunchCommand, prefix: &str) -> usize {
        command.args.iter().filter(|a| a.starts_with(prefix)).count()
    }

    #[test]
    fn legacy_versions_get_both_extra_library_path_properties() {
        for id in ["1.12.2", "1.8.9", "1.7.10"] {
            let profile = Profile::new("Old", id, "/games/old");
            let command = builder()
                .build(&profile, &legacy_metadata(id), &credentials(), &paths(&profile))
                .unwrap();
            assert_eq!(count_prefix(&command, "-Djava.library.path="), 1, "{id}");
            assert_eq!(count_prefix(&command, "-Dorg.lwjgl.librarypath="), 1, "{id}");
            assert_eq!(count_prefix(&command, "-Dnet.java.games.input.librarypath="), 1, "{id}");
        }
    }

    #[test]
    fn modern_versions_get_only_the_standard_library_path() {
        for id in ["1.13", "1.16.5", "1.20.1"] {
            let profile = Profile::new("New", id, "/games/new");
            let command = builder()
                .build(&profile, &modern_metadata(id), &credentials(), &paths(&profile))
                .unwrap();
            assert_eq!(count_prefix(&command, "-Djava.library.path="), 1, "{id}");
            assert_eq!(count_prefix(&command, "-Dorg.lwjgl.librarypath="), 0, "{id}");
            assert_eq!(count_prefix(&command, "-Dnet.java.games.input.librarypath="), 0, "{id}");
        }
    }

    #[test]
    fn snapshots_follow_document_shape() {
        let legacy_snapshot = legacy_metadata("17w31a");
        assert!(uses_legacy_lwjgl("17w31a", &legacy_snapshot));
        let modern_snapshot = modern_metadata("23w31a");
        assert!(!uses_legacy_lwjgl("23w31a", &modern_snapshot));
    }

    #[test]
    fn fabric_profile_selects_knot_and_development_flag() {
        let vanilla = Profile::new("Fabric", "1.20.1", "/games/fabric");
        let fabric = vanilla.clone().with_mod_loader(ModLoaderType::Fabric, "0.14.21");
        let metadata = modern_metadata("fabric-loader-0.14.21-1.20.1");

        let command = builder()
            .build(&fabric, &metadata, &credentials(), &paths(&fabric))
            .unwrap();
        assert!(command.has_arg(FABRIC_MAIN_CLASS));
        assert!(command.has_arg("-Dfabric.development=false"));
        let main = command.main_class_index(FABRIC_MAIN_CLASS).unwrap();
        let flag = command
            .args
            .iter()
            .position(|a| a == "-Dfabric.development=false")
            .unwrap();
        assert!(flag < main);

        let plain = builder()
            .build(&vanilla, &modern_metadata("1.20.1"), &credentials(), &paths(&vanilla))
            .unwrap();
        assert!(plain.has_arg("net.minecraft.client.main.Main"));
        assert!(!plain.has_arg("-Dfabric.development=false"));
    }

    #[test]
    fn quilt_profile_selects_its_own_knot_client() {
        let profile =
            Profile::new("Quilt", "1.20.1", "/games/q").with_mod_loader(ModLoaderType::Quilt, "0.19.2");
        let command = builder()
            .build(&profile, &modern_metadata("quilt-loader-0.19.2-1.20.1"), &credentials(), &paths(&profile))
            .unwrap();
        assert!(command.has_arg(QUILT_MAIN_CLASS));
        assert!(command.has_arg("-Dloader.development=false"));
    }

    #[test]
    fn modern_forge_gets_bootstrap_classpath_and_fml_arguments() {
        let profile =
            Profile::new("Forge", "1.20.1", "/games/forge").with_mod_loader(ModLoaderType::Forge, "47.2.0");
        let mut metadata = modern_metadata("1.20.1-forge-47.2.0");
        metadata.main_class = FORGE_BOOTSTRAP_MAIN_CLASS.to_string();
        metadata.libraries.push(
            serde_json::from_value(json!({"name": "cpw.mods:bootstraplauncher:1.1.2", "downloads": {"artifact": {
                "path": "cpw/mods/bootstraplauncher/1.1.2/bootstraplauncher-1.1.2.jar", "url": "https://x"}}}))
            .unwrap(),
        );

        let command = builder()
            .build(&profile, &metadata, &credentials(), &paths(&profile))
            .unwrap();
        let main = command.main_class_index(FORGE_BOOTSTRAP_MAIN_CLASS).unwrap();
        let game = &command.args[main + 1..];
        assert!(game.windows(2).any(|w| w[0] == "--fml.mcVersion" && w[1] == "1.20.1"));
        assert!(game.windows(2).any(|w| w[0] == "--fml.forgeVersion" && w[1] == "47.2.0"));
        assert!(command
            .args
            .windows(2)
            .any(|w| w[0] == "--add-opens" && w[1] == "java.base/java.lang=ALL-UNNAMED"));

        let cp_index = command.args.iter().position(|a| a == "-cp").unwrap();
        assert!(command.args[cp_index + 1].starts_with("/data/libraries/cpw/mods/bootstraplauncher"));
    }

    #[test]
    fn legacy_forge_uses_launchwrapper_with_tweak_class() {
        let profile = Profile::new("Old Forge", "1.12.2", "/games/of")
            .with_mod_loader(ModLoaderType::Forge, "14.23.5.2860");
        let mut metadata = legacy_metadata("1.12.2-forge-14.23.5.2860");
        metadata.main_class = FORGE_LAUNCHWRAPPER_MAIN_CLASS.to_string();

        let command = builder()
            .build(&profile, &metadata, &credentials(), &paths(&profile))
            .unwrap();
        assert!(command.has_arg(FORGE_LAUNCHWRAPPER_MAIN_CLASS));
        assert!(command.has_arg(FORGE_TWEAK_CLASS));
        assert!(!command.has_arg("--fml.mcVersion"));
        assert!(!command.has_arg("--add-opens"));
        assert_eq!(count_prefix(&command, "-Dorg.lwjgl.librarypath="), 1);
    }

    #[test]
    fn tokens_are_substituted_and_unknown_ones_dropped() {
        let mut profile = Profile::new("Tokens", "1.20.1", "/games/t");
        profile.resolution = Some(Resolution {
            width: 1280,
            height: 720,
        });
        let command = builder()
            .build(&profile, &modern_metadata("1.20.1"), &credentials(), &paths(&profile))
            .unwrap();

        let has_pair = |flag: &str, value: &str| command.args.windows(2).any(|w| w[0] == flag && w[1] == value);
        assert!(has_pair("--username", "Steve"));
        assert!(has_pair("--uuid", "uuid-1"));
        assert!(has_pair("--accessToken", "tok"));
        assert!(has_pair("--xuid", "0"));
        assert!(has_pair("--width", "1280"));
        assert!(has_pair("--assetsDir", "/data/assets"));
        assert!(!command.has_arg("--quickPlayPath"));
        assert!(command.args.iter().all(|a| !a.contains("${")));
        assert_eq!(count_prefix(&command, "-Dminecraft.launcher.brand=test-launcher"), 1);
        assert_eq!(command.args.iter().filter(|a| *a == "-cp").count(), 1);
    }

    #[test]
    fn legacy_session_token_and_virtual_assets() {
        let profile = Profile::new("Legacy", "1.8.9", "/games/l");
        let mut metadata = legacy_metadata("1.8.9");
        metadata.assets = Some("legacy".into());
        metadata.minecraft_arguments =
            Some("--session ${auth_session} --assetsDir ${game_assets}".into());

        let command = builder()
            .build(&profile, &metadata, &credentials(), &paths(&profile))
            .unwrap();
        assert!(command.has_arg("token:tok:uuid-1"));
        assert!(command.has_arg("/data/assets/virtual/legacy"));
    }

    #[test]
    fn memory_and_extra_arguments_close_the_jvm_section() {
        let mut profile = Profile::new("Mem", "1.20.1", "/games/m").with_memory(1024, 4096);
        profile.extra_jvm_args = vec!["-XX:+UseG1GC".into(), "-Xmx8G".into()];
        let command = builder()
            .build(&profile, &modern_metadata("1.20.1"), &credentials(), &paths(&profile))
            .unwrap();

        let main = command.main_class_index("net.minecraft.client.main.Main").unwrap();
        assert_eq!(command.args[main - 1], "-Xmx8G");
        assert_eq!(command.args[main - 2], "-XX:+UseG1GC");
        assert_eq!(command.args[main - 3], "-Xmx4096M");
        assert_eq!(command.args[main - 4], "-Xms1024M");
        assert_eq!(command.working_dir, PathBuf::from("/games/m"));
        assert!(command.env.values().all(|v| v.starts_with("/data/versions/1.20.1/natives")));
    }

    #[test]
    fn validation_lists_every_violation() {
        let profile = Profile::new("Broken", "1.20.1", "/games/b").with_memory(256, 128);
        let mut resolved = paths(&profile);
        resolved.java_executable = PathBuf::new();
        let mut metadata = modern_metadata("1.20.1");
        metadata.main_class.clear();

        let strict = CommandBuilder::new(
            Arc::new(CountingProbe::new()),
            RuleContext::for_platform("linux", "x86_64"),
        );
        let err = strict
            .build(&profile, &metadata, &credentials(), &resolved)
            .unwrap_err();
        let violations = match err {
            LauncherError::Validation { violations } => violations,
            other => panic!("expected validation error, got {other:?}"),
        };
        // java, min floor, min > max, missing lwjgl, missing client jar, main class
        assert_eq!(violations.len(), 6, "{violations:?}");
    }

    #[test]
    fn log_rendering_quotes_arguments_with_spaces() {
        let command = LaunchCommand {
            executable: PathBuf::from("/usr/bin/java"),
            args: vec!["-cp".into(), "/a b/c.jar".into()],
            working_dir: PathBuf::from("/"),
            env: BTreeMap::new(),
        };
        assert_eq!(command.display_for_logs(), "/usr/bin/java -cp \"/a b/c.jar\"");
    }
}
