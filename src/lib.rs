/// voxclone - Voice Cloning Service
///
/// Clones a voice from uploaded audio samples through a third-party
/// text-to-speech provider, synthesizes long-form text with it and
/// hands back a downloadable audio artifact.

pub mod config;
pub mod core;
pub mod server;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
