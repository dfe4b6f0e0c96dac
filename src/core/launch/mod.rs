pub mod arguments;
pub mod classpath;
pub mod command;
pub mod crash;
pub mod events;
pub mod natives;
pub mod process;
pub mod supervisor;

pub use command::{CommandBuilder, LaunchCommand, ResolvedPaths, LAST_LEGACY_LWJGL_RELEASE};
pub use crash::{CrashCause, CrashReport};
pub use events::{ProcessEvent, ProcessRecord, ProcessStatus};
pub use natives::{classify_library, NativeClassification, NativeRule, NativesExtraction};
pub use process::{ProcessRunner, TokioProcessRunner};
pub use supervisor::{LaunchOptions, ProcessSupervisor, SupervisorConfig};
