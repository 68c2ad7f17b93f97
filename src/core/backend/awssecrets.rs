//! AWS Secrets Manager backend.
//!
//! Stores the batch as one secret string. Enable with `--features aws`.
//!
//! ## Usage
//!
//! ```text
//! flux-repo write -b awssecrets -p flux/prod -f manifests/ -o out/
//! ```
//!
//! The secret is created with the tag `flux-repo=managed` on first write.
//! Later writes add a new version, and each reference pins the VersionId it
//! was written with.

use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::types::Tag;
use aws_sdk_secretsmanager::Client;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::aws::{block_on, sdk_config};
use super::{Backend, CommitToken};
use crate::core::batch::{render_yaml, Secrets};
use crate::core::config::AwsConfig;
use crate::core::constants::{MANAGED_TAG_KEY, MANAGED_TAG_VALUE, STORE_DESCRIPTION};
use crate::core::resolver::Reference;
use crate::error::{ResolveError, Result, StoreError};

const NAME: &str = "awssecrets";

pub struct SecretsManager {
    path: String,
    aws: AwsConfig,
}

impl SecretsManager {
    pub fn new(path: &str, aws: &AwsConfig) -> Self {
        Self {
            path: path.to_string(),
            aws: aws.clone(),
        }
    }
}

impl Backend for SecretsManager {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        let document = render_yaml(secrets)?;

        trace!(path = %self.path, document_len = document.len(), "storing in Secrets Manager");

        let version = block_on(async {
            let config = sdk_config(&self.aws, None).await;
            let client = Client::new(&config);

            let tag = Tag::builder()
                .key(MANAGED_TAG_KEY)
                .value(MANAGED_TAG_VALUE)
                .build();

            let created = client
                .create_secret()
                .name(&self.path)
                .description(STORE_DESCRIPTION)
                .secret_string(document.as_str())
                .tags(tag)
                .send()
                .await;

            match created {
                Ok(out) => Ok(out.version_id().map(str::to_string)),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_resource_exists_exception()) =>
                {
                    debug!(path = %self.path, "secret exists, putting new version");
                    client
                        .put_secret_value()
                        .secret_id(&self.path)
                        .secret_string(document.as_str())
                        .send()
                        .await
                        .map(|out| out.version_id().map(str::to_string))
                        .map_err(|e| format!("putting secret value: {}", DisplayErrorContext(&e)))
                }
                Err(e) => Err(format!("creating secret: {}", DisplayErrorContext(&e))),
            }
        })
        .and_then(|r| r)
        .map_err(commit_failed)?
        .ok_or_else(|| commit_failed("no VersionId returned".to_string()))?;

        debug!(path = %self.path, version = %version, "stored in Secrets Manager");
        Ok(CommitToken::new(version))
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String {
        format!(
            "ref+awssecrets://{}?version_id={}#/{}/{}/{}",
            self.path, token, namespace, name, key
        )
    }
}

/// Fetch the stored document a reference points at.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if the secret or version does not
/// exist, and `ResolveError::Unavailable` for any other failure.
pub fn fetch(reference: &Reference, aws: &AwsConfig) -> Result<Zeroizing<String>> {
    trace!(path = %reference.location, "fetching from Secrets Manager");

    let fetched = block_on(async {
        let config = sdk_config(aws, reference.query("region")).await;
        let client = Client::new(&config);

        let mut request = client.get_secret_value().secret_id(&reference.location);
        if let Some(version) = reference.query("version_id") {
            request = request.version_id(version);
        }

        match request.send().await {
            Ok(out) => Ok(out.secret_string().map(|s| Zeroizing::new(s.to_string()))),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(format!("getting secret value: {}", DisplayErrorContext(&e))),
        }
    })
    .and_then(|r| r)
    .map_err(unavailable)?;

    fetched.ok_or_else(|| {
        ResolveError::NotFound {
            reference: reference.raw.clone(),
        }
        .into()
    })
}

fn commit_failed(reason: String) -> crate::error::Error {
    StoreError::CommitFailed {
        backend: NAME,
        reason,
    }
    .into()
}

fn unavailable(reason: String) -> crate::error::Error {
    ResolveError::Unavailable {
        scheme: NAME,
        reason,
    }
    .into()
}
