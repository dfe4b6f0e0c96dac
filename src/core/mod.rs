// ─── Launcher Core ───
// Artifact pipeline, mod-loader installation and game-process supervision.
//
// Architecture:
//   core/
//     store/      On-disk layout, hashing, file-presence probe
//     maven/      Maven coordinates
//     version/    Manifest cache, version documents, rules
//     downloader/ Resumable downloads with SHA-1 checks
//     assets/     Asset index + object planning
//     java/       Java requirement and runtime resolution
//     loaders/    Loader catalogs and installers
//     auth/       Session handed over by the account layer
//     profile/    Launch profiles and their stores
//     launch/     Command builder and process supervisor
//     state/      Settings + composition root

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod maven;
pub mod profile;
pub mod state;
pub mod store;
pub mod version;

#[cfg(test)]
pub mod testing;
