// ─── Launchpad Core ───
// Resolves the jars a game launch needs and makes sure they are on disk.
//
// Architecture:
//   core/
//     environment/  Side, OS detection, storage layouts
//     maven/        Coordinate parsing and repository paths
//     verify/       Streaming digest verification
//     cache/        Per-source metadata cache and invalidation keys
//     config/       Resolver settings and launch arguments
//     version/      Mojang manifest + version JSON + OS rules
//     sources/      Runtime, loader and folder jar sources
//     downloader/   Concurrent, cancellable downloads
//     resolver/     Orchestrates sources, local checks and downloads

pub mod cache;
pub mod config;
pub mod downloader;
pub mod environment;
pub mod error;
pub mod http;
pub mod maven;
pub mod resolver;
pub mod sources;
pub mod verify;
pub mod version;
