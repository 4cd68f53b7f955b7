//! Resolution of catalog file paths to playable URLs.

use anyhow::Result;

/// Resolves logical catalog file paths to URLs a client can stream from.
pub trait AudioResolver: Send + Sync {
    fn resolve_url(&self, file_path: &str) -> Result<String>;
}

/// Resolver for audio served from the local filesystem mount point.
pub struct LocalAudioResolver {
    base_path: String,
}

impl LocalAudioResolver {
    /// `base_path` is the URL prefix the audio directory is served under,
    /// e.g. `audio` becomes `/audio/...` URLs.
    pub fn new(base_path: &str) -> Self {
        LocalAudioResolver {
            base_path: format!("/{}", base_path.trim_matches('/')),
        }
    }
}

/// Strip traversal components so a crafted file path cannot escape the
/// audio mount point.
fn sanitize_path(file_path: &str) -> String {
    file_path
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}

impl AudioResolver for LocalAudioResolver {
    fn resolve_url(&self, file_path: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_path, sanitize_path(file_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_under_base_path() {
        let resolver = LocalAudioResolver::new("audio");
        assert_eq!(
            resolver.resolve_url("focus/track.mp3").unwrap(),
            "/audio/focus/track.mp3"
        );
    }

    #[test]
    fn normalizes_base_path_slashes() {
        let resolver = LocalAudioResolver::new("/media/audio/");
        assert_eq!(
            resolver.resolve_url("track.mp3").unwrap(),
            "/media/audio/track.mp3"
        );
    }

    #[test]
    fn strips_traversal_components() {
        let resolver = LocalAudioResolver::new("audio");
        assert_eq!(
            resolver.resolve_url("../../etc/passwd").unwrap(),
            "/audio/etc/passwd"
        );
        assert_eq!(
            resolver.resolve_url("/a/./b/../c.mp3").unwrap(),
            "/audio/a/b/c.mp3"
        );
    }
}
