//! Versioned S3 object backend.
//!
//! The store path is `bucket/key`. The bucket must have versioning enabled,
//! since each reference pins the object version it was written with.
//! Enable with `--features aws`.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::aws::{block_on, sdk_config, split_bucket_key};
use super::{Backend, CommitToken};
use crate::core::batch::{render_yaml, Secrets};
use crate::core::config::AwsConfig;
use crate::core::resolver::Reference;
use crate::error::{ConfigError, ResolveError, Result, StoreError};

const NAME: &str = "s3";

pub struct S3Object {
    path: String,
    bucket: String,
    key: String,
    aws: AwsConfig,
}

impl S3Object {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `path` is not `bucket/key`.
    pub fn new(path: &str, aws: &AwsConfig) -> Result<Self> {
        let (bucket, key) = split_bucket_key(path).ok_or_else(|| ConfigError::InvalidValue {
            field: "path (-p)",
            reason: format!("{:?} must be bucket/key for the s3 backend", path),
        })?;

        Ok(Self {
            path: path.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            aws: aws.clone(),
        })
    }
}

impl Backend for S3Object {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        let document = render_yaml(secrets)?;

        trace!(
            bucket = %self.bucket,
            key = %self.key,
            document_len = document.len(),
            "putting s3 object"
        );

        let version = block_on(async {
            let config = sdk_config(&self.aws, None).await;
            let client = Client::new(&config);

            client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(ByteStream::from(document.as_bytes().to_vec()))
                .send()
                .await
                .map(|out| out.version_id().map(str::to_string))
                .map_err(|e| format!("putting s3 object: {}", DisplayErrorContext(&e)))
        })
        .and_then(|r| r)
        .map_err(commit_failed)?
        .ok_or_else(|| {
            commit_failed(format!(
                "bucket {} returned no VersionId; enable versioning on it",
                self.bucket
            ))
        })?;

        debug!(bucket = %self.bucket, key = %self.key, version = %version, "stored s3 object");
        Ok(CommitToken::new(version))
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String {
        format!(
            "ref+s3://{}?version={}#/{}/{}/{}",
            self.path, token, namespace, name, key
        )
    }
}

/// Fetch the stored document a reference points at.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if the object or version does not
/// exist, and `ResolveError::Unavailable` for any other failure.
pub fn fetch(reference: &Reference, aws: &AwsConfig) -> Result<Zeroizing<String>> {
    let (bucket, key) = split_bucket_key(&reference.location).ok_or_else(|| {
        ResolveError::InvalidReference {
            reference: reference.raw.clone(),
            reason: "s3 location must be bucket/key".to_string(),
        }
    })?;

    trace!(bucket, key, "fetching s3 object");

    let fetched = block_on(async {
        let config = sdk_config(aws, reference.query("region")).await;
        let client = Client::new(&config);

        let mut request = client.get_object().bucket(bucket).key(key);
        if let Some(version) = reference.query("version").filter(|v| !v.is_empty()) {
            request = request.version_id(version);
        }

        let out = match request.send().await {
            Ok(out) => out,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => return Err(format!("getting s3 object: {}", DisplayErrorContext(&e))),
        };

        let bytes = out
            .body
            .collect()
            .await
            .map_err(|e| format!("reading s3 object body: {}", e))?
            .into_bytes();

        String::from_utf8(bytes.to_vec())
            .map(|s| Some(Zeroizing::new(s)))
            .map_err(|_| "s3 object is not UTF-8".to_string())
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
