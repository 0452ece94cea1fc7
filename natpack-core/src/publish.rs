//! Publish destination resolution and archive upload.
//!
//! Repository URLs come from a priority chain of sources: explicit property,
//! then environment, then a built-in default. The first source yielding a
//! non-empty value wins and later sources are never consulted.

use crate::error::PipelineError;
use crate::ports::UploadPort;
use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use natpack_types::publish::{
    Credentials, DestinationSource, Publication, PublishDestination, PublishRepository,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const DEFAULT_ARTIFACTORY_HOST: &str = "artifactory.terasology.org";
pub const DEFAULT_PUBLISH_ORG: &str = "libs";
pub const DEFAULT_RESOLUTION_REPO: &str =
    "http://artifactory.terasology.org/artifactory/virtual-repo-live";

pub const PUBLISH_REPO_PROPERTY: &str = "publishRepo";
pub const RESOLUTION_REPO_PROPERTY: &str = "alternativeResolutionRepo";
pub const MAVEN_USER_PROPERTY: &str = "mavenUser";
pub const MAVEN_PASS_PROPERTY: &str = "mavenPass";

/// Build properties: a loosely typed key/value bag, as supplied in config
/// files or on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, toml::Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<toml::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    /// Property rendered as text. Strings are taken verbatim, other values
    /// use their TOML rendering.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Merge `other` over `self`; keys in `other` win.
    pub fn extend(&mut self, other: Properties) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, toml::Value)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, toml::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One link of a resolution chain.
pub type Resolver<I, T> = fn(&I) -> Option<T>;

/// Evaluate `chain` in order and return the first value produced.
pub fn first_non_empty<I, T>(chain: &[Resolver<I, T>], input: &I) -> Option<T> {
    chain.iter().find_map(|resolve| resolve(input))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `http://<host>/artifactory/<repo>`
pub fn artifactory_url(host: &str, repo: &str) -> String {
    format!("http://{host}/artifactory/{repo}")
}

/// A `publishRepo` value is a repository name, or a full URL used verbatim.
fn repo_property_url(host: &str, repo: &str) -> String {
    if repo.contains("://") {
        repo.to_string()
    } else {
        artifactory_url(host, repo)
    }
}

/// `<org>-snapshot-local` or `<org>-release-local` depending on the version.
pub fn deduced_repo_name(org: &str, version: &str) -> String {
    if version.ends_with("SNAPSHOT") {
        format!("{org}-snapshot-local")
    } else {
        format!("{org}-release-local")
    }
}

/// Inputs to publish destination resolution.
#[derive(Debug, Clone, Copy)]
pub struct DestinationInputs<'a> {
    /// Explicit `publishRepo` property.
    pub repo_property: Option<&'a str>,
    /// `PUBLISH_ORG` environment value.
    pub publish_org: Option<&'a str>,
    pub version: &'a str,
    pub host: &'a str,
}

fn from_repo_property(inputs: &DestinationInputs<'_>) -> Option<PublishDestination> {
    non_empty(inputs.repo_property).map(|repo| PublishDestination {
        url: repo_property_url(inputs.host, repo),
        source: DestinationSource::Property,
    })
}

fn from_publish_org(inputs: &DestinationInputs<'_>) -> Option<PublishDestination> {
    non_empty(inputs.publish_org).map(|org| PublishDestination {
        url: artifactory_url(inputs.host, &deduced_repo_name(org, inputs.version)),
        source: DestinationSource::Environment,
    })
}

fn from_default_org(inputs: &DestinationInputs<'_>) -> PublishDestination {
    PublishDestination {
        url: artifactory_url(
            inputs.host,
            &deduced_repo_name(DEFAULT_PUBLISH_ORG, inputs.version),
        ),
        source: DestinationSource::Default,
    }
}

/// Optional publish sources in priority order; the default org closes the chain.
pub fn destination_chain<'a>() -> [Resolver<DestinationInputs<'a>, PublishDestination>; 2] {
    [
        from_repo_property as Resolver<_, _>,
        from_publish_org as Resolver<_, _>,
    ]
}

/// Resolve the upload repository URL.
pub fn resolve_destination(inputs: &DestinationInputs<'_>) -> PublishDestination {
    let destination = first_non_empty(&destination_chain(), inputs)
        .unwrap_or_else(|| from_default_org(inputs));
    info!(url = %destination.url, source = %destination.source, "resolved publish repository");
    destination
}

/// Inputs to dependency-resolution repository lookup.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionInputs<'a> {
    /// Explicit `alternativeResolutionRepo` property (a full URL).
    pub repo_property: Option<&'a str>,
    /// `RESOLUTION_REPO` environment value (a full URL).
    pub resolution_repo: Option<&'a str>,
}

fn resolution_from_property(inputs: &ResolutionInputs<'_>) -> Option<PublishDestination> {
    non_empty(inputs.repo_property).map(|url| PublishDestination {
        url: url.to_string(),
        source: DestinationSource::Property,
    })
}

fn resolution_from_env(inputs: &ResolutionInputs<'_>) -> Option<PublishDestination> {
    non_empty(inputs.resolution_repo).map(|url| PublishDestination {
        url: url.to_string(),
        source: DestinationSource::Environment,
    })
}

pub fn resolution_chain<'a>() -> [Resolver<ResolutionInputs<'a>, PublishDestination>; 2] {
    [
        resolution_from_property as Resolver<_, _>,
        resolution_from_env as Resolver<_, _>,
    ]
}

/// Resolve the repository dependencies are fetched from.
pub fn resolve_resolution_repo(inputs: &ResolutionInputs<'_>) -> PublishDestination {
    first_non_empty(&resolution_chain(), inputs).unwrap_or_else(|| PublishDestination {
        url: DEFAULT_RESOLUTION_REPO.to_string(),
        source: DestinationSource::Default,
    })
}

fn credential_text(properties: &Properties, key: &str) -> Result<Option<String>, PipelineError> {
    match properties.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(PipelineError::InvalidCredentials {
            property: key.to_string(),
        }),
    }
}

/// Basic-auth credentials from `mavenUser` / `mavenPass`.
///
/// Credentials are considered only when both properties exist; then both
/// must be strings.
pub fn resolve_credentials(properties: &Properties) -> Result<Option<Credentials>, PipelineError> {
    let has_user = properties.get(MAVEN_USER_PROPERTY).is_some();
    let has_pass = properties.get(MAVEN_PASS_PROPERTY).is_some();
    if !(has_user && has_pass) {
        if has_user || has_pass {
            debug!("only one of mavenUser/mavenPass set; publishing unauthenticated");
        }
        return Ok(None);
    }
    let username = credential_text(properties, MAVEN_USER_PROPERTY)?;
    let password = credential_text(properties, MAVEN_PASS_PROPERTY)?;
    Ok(username
        .zip(password)
        .map(|(username, password)| Credentials { username, password }))
}

/// Full destination plus credentials for a publish run.
pub fn resolve_repository(
    properties: &Properties,
    publish_org: Option<&str>,
    publication: &Publication,
    host: &str,
) -> Result<PublishRepository, PipelineError> {
    let repo_property = properties.text(PUBLISH_REPO_PROPERTY);
    let destination = resolve_destination(&DestinationInputs {
        repo_property: repo_property.as_deref(),
        publish_org,
        version: &publication.version,
        host,
    });
    let credentials = resolve_credentials(properties)?;
    Ok(PublishRepository::new(destination, credentials))
}

/// `<repo>/<group path>/<artifact>/<version>/<artifact>-<version>.zip`
pub fn archive_url(repository: &PublishRepository, publication: &Publication) -> String {
    format!(
        "{}/{}",
        repository.url.trim_end_matches('/'),
        publication.repository_path()
    )
}

/// Upload the archive and its `.sha256` checksum. Returns the URLs written.
pub fn upload_archive(
    repository: &PublishRepository,
    publication: &Publication,
    archive: &Utf8Path,
    uploader: &dyn UploadPort,
) -> Result<Vec<String>, PipelineError> {
    let bytes = fs::read(archive).with_context(|| format!("read archive {archive}"))?;
    let checksum = natpack_hash::sha256_hex(&bytes);
    let url = archive_url(repository, publication);
    let checksum_url = format!("{url}.sha256");

    if !repository.is_authenticated() {
        debug!(url = %url, "no credentials configured; uploading unauthenticated");
    }

    let credentials = repository.credentials.as_ref();
    for (target, body) in [(&url, bytes.as_slice()), (&checksum_url, checksum.as_bytes())] {
        uploader
            .put(target, body, credentials)
            .map_err(|err| PipelineError::Upload {
                url: target.clone(),
                message: format!("{err:#}"),
            })?;
        info!(url = %target, bytes = body.len(), "uploaded");
    }

    Ok(vec![url, checksum_url])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn inputs<'a>(
        repo_property: Option<&'a str>,
        publish_org: Option<&'a str>,
        version: &'a str,
    ) -> DestinationInputs<'a> {
        DestinationInputs {
            repo_property,
            publish_org,
            version,
            host: DEFAULT_ARTIFACTORY_HOST,
        }
    }

    #[test]
    fn explicit_property_wins_over_everything() {
        let dest = resolve_destination(&inputs(Some("custom"), Some("acme"), "1.0.0-SNAPSHOT"));
        assert_eq!(
            dest.url,
            "http://artifactory.terasology.org/artifactory/custom"
        );
        assert_eq!(dest.source, DestinationSource::Property);
    }

    #[test]
    fn repo_property_may_be_a_full_url() {
        let dest = resolve_destination(&inputs(Some("file:///srv/repo"), None, "1.0.0"));
        assert_eq!(dest.url, "file:///srv/repo");
        assert_eq!(dest.source, DestinationSource::Property);
    }

    #[test]
    fn publish_org_with_snapshot_version() {
        let dest = resolve_destination(&inputs(None, Some("acme"), "1.0.0-SNAPSHOT"));
        assert!(dest.url.ends_with("/acme-snapshot-local"));
        assert_eq!(dest.source, DestinationSource::Environment);
    }

    #[test]
    fn default_org_with_release_version() {
        let dest = resolve_destination(&inputs(None, None, "1.0.0"));
        assert_eq!(
            dest.url,
            "http://artifactory.terasology.org/artifactory/libs-release-local"
        );
        assert_eq!(dest.source, DestinationSource::Default);
    }

    #[test]
    fn empty_values_fall_through() {
        let dest = resolve_destination(&inputs(Some(""), Some(""), "0.0.1"));
        assert!(dest.url.ends_with("/libs-release-local"));
        assert_eq!(dest.source, DestinationSource::Default);
    }

    #[test]
    fn custom_host_is_used_in_template() {
        let dest = resolve_destination(&DestinationInputs {
            repo_property: None,
            publish_org: None,
            version: "2.0.0-SNAPSHOT",
            host: "repo.example.org",
        });
        assert_eq!(
            dest.url,
            "http://repo.example.org/artifactory/libs-snapshot-local"
        );
    }

    #[test]
    fn first_non_empty_short_circuits() {
        thread_local! {
            static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
        }
        fn first(_: &()) -> Option<u32> {
            CALLS.with(|c| c.borrow_mut().push("first"));
            None
        }
        fn second(_: &()) -> Option<u32> {
            CALLS.with(|c| c.borrow_mut().push("second"));
            Some(2)
        }
        fn third(_: &()) -> Option<u32> {
            CALLS.with(|c| c.borrow_mut().push("third"));
            Some(3)
        }

        let chain: [Resolver<(), u32>; 3] = [first, second, third];
        assert_eq!(first_non_empty(&chain, &()), Some(2));
        CALLS.with(|c| assert_eq!(*c.borrow(), vec!["first", "second"]));
    }

    #[test]
    fn resolution_repo_chain() {
        let from_prop = resolve_resolution_repo(&ResolutionInputs {
            repo_property: Some("http://mirror.example.org/repo"),
            resolution_repo: Some("http://env.example.org/repo"),
        });
        assert_eq!(from_prop.url, "http://mirror.example.org/repo");
        assert_eq!(from_prop.source, DestinationSource::Property);

        let from_env = resolve_resolution_repo(&ResolutionInputs {
            repo_property: None,
            resolution_repo: Some("http://env.example.org/repo"),
        });
        assert_eq!(from_env.source, DestinationSource::Environment);

        let fallback = resolve_resolution_repo(&ResolutionInputs {
            repo_property: None,
            resolution_repo: Some(""),
        });
        assert_eq!(fallback.url, DEFAULT_RESOLUTION_REPO);
        assert_eq!(fallback.source, DestinationSource::Default);
    }

    #[test]
    fn credentials_require_both_properties() {
        let mut props = Properties::new();
        props.insert(MAVEN_USER_PROPERTY, "ci");
        assert_eq!(resolve_credentials(&props).expect("creds"), None);

        props.insert(MAVEN_PASS_PROPERTY, "secret");
        assert_eq!(
            resolve_credentials(&props).expect("creds"),
            Some(Credentials {
                username: "ci".to_string(),
                password: "secret".to_string(),
            })
        );
    }

    #[test]
    fn non_string_credential_is_rejected() {
        let mut props = Properties::new();
        props.insert(MAVEN_USER_PROPERTY, "ci");
        props.insert(MAVEN_PASS_PROPERTY, 12345_i64);
        let err = resolve_credentials(&props).expect_err("invalid");
        assert!(
            matches!(err, PipelineError::InvalidCredentials { ref property } if property == "mavenPass")
        );
    }

    #[test]
    fn lone_non_string_credential_is_ignored() {
        let mut props = Properties::new();
        props.insert(MAVEN_USER_PROPERTY, 42_i64);
        assert_eq!(resolve_credentials(&props).expect("creds"), None);

        let mut props = Properties::new();
        props.insert(MAVEN_PASS_PROPERTY, true);
        assert_eq!(resolve_credentials(&props).expect("creds"), None);
    }

    #[test]
    fn destination_chain_runs_property_before_org() {
        let chain = destination_chain();
        let both = inputs(Some("custom"), Some("acme"), "1.0.0");
        assert_eq!(
            chain[0](&both).map(|d| d.source),
            Some(DestinationSource::Property)
        );
        assert_eq!(
            chain[1](&both).map(|d| d.source),
            Some(DestinationSource::Environment)
        );
        assert_eq!(
            first_non_empty(&chain, &inputs(None, Some("acme"), "1.0.0")).map(|d| d.url),
            Some("http://artifactory.terasology.org/artifactory/acme-release-local".to_string())
        );
        assert_eq!(first_non_empty(&chain, &inputs(None, None, "1.0.0")), None);
    }

    #[test]
    fn resolution_chain_prefers_property() {
        let chain = resolution_chain();
        let input = ResolutionInputs {
            repo_property: Some("http://a.example/repo"),
            resolution_repo: Some("http://b.example/repo"),
        };
        assert_eq!(
            first_non_empty(&chain, &input).map(|d| d.url),
            Some("http://a.example/repo".to_string())
        );
    }

    #[test]
    fn property_text_renders_non_strings() {
        let mut props = Properties::new();
        props.insert(PUBLISH_REPO_PROPERTY, "libs-custom");
        props.insert("retries", 3_i64);
        assert_eq!(props.text(PUBLISH_REPO_PROPERTY).as_deref(), Some("libs-custom"));
        assert_eq!(props.text("retries").as_deref(), Some("3"));
        assert_eq!(props.text("missing"), None);
    }

    #[test]
    fn resolve_repository_combines_destination_and_credentials() {
        let mut props = Properties::new();
        props.insert(PUBLISH_REPO_PROPERTY, "team-local");
        props.insert(MAVEN_USER_PROPERTY, "ci");
        props.insert(MAVEN_PASS_PROPERTY, "secret");

        let repo = resolve_repository(
            &props,
            Some("acme"),
            &Publication::default(),
            DEFAULT_ARTIFACTORY_HOST,
        )
        .expect("repository");
        assert_eq!(
            repo.url,
            "http://artifactory.terasology.org/artifactory/team-local"
        );
        assert!(repo.is_authenticated());
    }

    #[derive(Default)]
    struct RecordingUploader {
        puts: RefCell<Vec<(String, Vec<u8>, bool)>>,
        fail: bool,
    }

    impl UploadPort for RecordingUploader {
        fn put(
            &self,
            url: &str,
            body: &[u8],
            credentials: Option<&Credentials>,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("401 Unauthorized");
            }
            self.puts
                .borrow_mut()
                .push((url.to_string(), body.to_vec(), credentials.is_some()));
            Ok(())
        }
    }

    fn repository() -> PublishRepository {
        PublishRepository::new(
            PublishDestination {
                url: "http://artifactory.terasology.org/artifactory/libs-release-local/"
                    .to_string(),
                source: DestinationSource::Default,
            },
            None,
        )
    }

    #[test]
    fn upload_puts_archive_then_checksum() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let archive = camino::Utf8PathBuf::from_path_buf(temp.path().join("core-rust-0.0.1.zip"))
            .expect("utf8");
        std::fs::write(&archive, b"zip bytes").expect("write archive");

        let uploader = RecordingUploader::default();
        let urls = upload_archive(&repository(), &Publication::default(), &archive, &uploader)
            .expect("upload");

        let base = "http://artifactory.terasology.org/artifactory/libs-release-local/org/terasology/rust/core-rust/0.0.1/core-rust-0.0.1.zip";
        assert_eq!(urls, vec![base.to_string(), format!("{base}.sha256")]);

        let puts = uploader.puts.borrow();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].1, b"zip bytes".to_vec());
        assert_eq!(
            String::from_utf8(puts[1].1.clone()).expect("utf8"),
            natpack_hash::sha256_hex(b"zip bytes")
        );
        assert!(!puts[0].2);
    }

    #[test]
    fn upload_failure_is_reported_with_url() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let archive =
            camino::Utf8PathBuf::from_path_buf(temp.path().join("a.zip")).expect("utf8");
        std::fs::write(&archive, b"x").expect("write archive");

        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        let err = upload_archive(&repository(), &Publication::default(), &archive, &uploader)
            .expect_err("upload fails");
        match err {
            PipelineError::Upload { url, message } => {
                assert!(url.ends_with("core-rust-0.0.1.zip"));
                assert!(message.contains("401"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
