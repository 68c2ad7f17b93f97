//! AWS SSM Parameter Store backend.
//!
//! Stores the batch as one SecureString parameter. Enable with
//! `--features aws`. Parameter names always get a leading `/`.

use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::{ParameterType, Tag};
use aws_sdk_ssm::Client;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::aws::{block_on, parameter_name, sdk_config};
use super::{Backend, CommitToken};
use crate::core::batch::{render_yaml, Secrets};
use crate::core::config::AwsConfig;
use crate::core::constants::{MANAGED_TAG_KEY, MANAGED_TAG_VALUE, STORE_DESCRIPTION};
use crate::core::resolver::Reference;
use crate::error::{ResolveError, Result, StoreError};

const NAME: &str = "awsssm";

pub struct ParameterStore {
    path: String,
    aws: AwsConfig,
}

impl ParameterStore {
    pub fn new(path: &str, aws: &AwsConfig) -> Self {
        Self {
            path: path.to_string(),
            aws: aws.clone(),
        }
    }
}

impl Backend for ParameterStore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        let document = render_yaml(secrets)?;
        let name = parameter_name(&self.path);

        trace!(name = %name, document_len = document.len(), "storing in Parameter Store");

        let version = block_on(async {
            let config = sdk_config(&self.aws, None).await;
            let client = Client::new(&config);

            // tags cannot be combined with overwrite, so only the first put is tagged
            let tag = Tag::builder()
                .key(MANAGED_TAG_KEY)
                .value(MANAGED_TAG_VALUE)
                .build()
                .map_err(|e| format!("building tag: {}", e))?;

            let created = client
                .put_parameter()
                .name(&name)
                .description(STORE_DESCRIPTION)
                .value(document.as_str())
                .r#type(ParameterType::SecureString)
                .tags(tag)
                .send()
                .await;

            match created {
                Ok(out) => Ok(out.version()),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_parameter_already_exists()) =>
                {
                    debug!(name = %name, "parameter exists, overwriting");
                    client
                        .put_parameter()
                        .name(&name)
                        .description(STORE_DESCRIPTION)
                        .value(document.as_str())
                        .r#type(ParameterType::SecureString)
                        .overwrite(true)
                        .send()
                        .await
                        .map(|out| out.version())
                        .map_err(|e| {
                            format!("overwriting ssm parameter: {}", DisplayErrorContext(&e))
                        })
                }
                Err(e) => Err(format!("putting ssm parameter: {}", DisplayErrorContext(&e))),
            }
        })
        .and_then(|r| r)
        .map_err(commit_failed)?;

        debug!(name = %name, version, "stored in Parameter Store");
        Ok(CommitToken::new(version.to_string()))
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String {
        format!(
            "ref+awsssm://{}?mode=singleparam&version={}#/{}/{}/{}",
            self.path, token, namespace, name, key
        )
    }
}

/// Fetch the stored document a reference points at.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if the parameter or version does not
/// exist, and `ResolveError::Unavailable` for any other failure.
pub fn fetch(reference: &Reference, aws: &AwsConfig) -> Result<Zeroizing<String>> {
    let mut name = parameter_name(&reference.location);
    if let Some(version) = reference.query("version").filter(|v| !v.is_empty()) {
        name = format!("{}:{}", name, version);
    }

    trace!(name = %name, "fetching from Parameter Store");

    let fetched = block_on(async {
        let config = sdk_config(aws, reference.query("region")).await;
        let client = Client::new(&config);

        match client
            .get_parameter()
            .name(&name)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(out) => Ok(out
                .parameter()
                .and_then(|p| p.value())
                .map(|v| Zeroizing::new(v.to_string()))),
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_parameter_not_found() || se.is_parameter_version_not_found()
                }) =>
            {
                Ok(None)
            }
            Err(e) => Err(format!("getting ssm parameter: {}", DisplayErrorContext(&e))),
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
