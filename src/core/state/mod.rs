pub mod app_state;
pub mod settings;

pub use app_state::{Collaborators, Launcher};
pub use settings::{default_data_dir, LauncherConfig};
