use super::RequestsLoggingLevel;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub requests_logging_level: RequestsLoggingLevel,
    /// Directory the audio files are served from under `/audio`.
    pub audio_dir: PathBuf,
    /// Frontend directory to be statically served instead of the status
    /// endpoint, when present.
    pub frontend_dir_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8080,
            requests_logging_level: RequestsLoggingLevel::Path,
            audio_dir: PathBuf::from("audio"),
            frontend_dir_path: None,
        }
    }
}
