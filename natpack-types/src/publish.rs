use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic-auth credentials for the publish repository.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which configuration source produced a repository URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSource {
    /// An explicit repository property (`publishRepo` / `alternativeResolutionRepo`).
    Property,
    /// An environment variable (`PUBLISH_ORG` / `RESOLUTION_REPO`).
    Environment,
    /// The built-in default.
    Default,
}

impl fmt::Display for DestinationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DestinationSource::Property => "property",
            DestinationSource::Environment => "environment",
            DestinationSource::Default => "default",
        };
        f.write_str(s)
    }
}

/// A resolved repository URL together with the source that won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDestination {
    pub url: String,
    pub source: DestinationSource,
}

/// Everything needed to upload: where, and as whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRepository {
    pub url: String,
    pub source: DestinationSource,
    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,
}

impl PublishRepository {
    pub fn new(destination: PublishDestination, credentials: Option<Credentials>) -> Self {
        Self {
            url: destination.url,
            source: destination.source,
            credentials,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Maven-style coordinates of the published archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Publication {
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("SNAPSHOT")
    }

    /// `<artifact>-<version>.zip`
    pub fn archive_file_name(&self) -> String {
        format!("{}-{}.zip", self.artifact, self.version)
    }

    /// Repository-relative path of the archive: `org/example/core/1.0/core-1.0.zip`.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.archive_file_name()
        )
    }
}

impl Default for Publication {
    fn default() -> Self {
        Self {
            group: "org.terasology.rust".to_string(),
            artifact: "core-rust".to_string(),
            version: "0.0.1".to_string(),
        }
    }
}
