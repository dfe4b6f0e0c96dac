pub mod runtime;

pub use runtime::{
    detect_java_installations, is_java_compatible_major, java_exe,
    required_java_for_minecraft_version, JavaInstallation, JavaResolver, StaticJavaResolver,
    SystemJavaResolver,
};
