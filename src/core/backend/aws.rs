//! Shared AWS session setup.
//!
//! Credentials come from the default provider chain. Region and profile can
//! be pinned in `[aws]` or with `--aws-region` / `--aws-profile`; a
//! `region` query parameter on a reference overrides both at read time.

use std::future::Future;

use tracing::trace;

use crate::core::config::AwsConfig;

/// Load the SDK configuration for the given session settings.
pub(crate) async fn sdk_config(aws: &AwsConfig, region: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = region.or(aws.region.as_deref()) {
        trace!(region, "using explicit AWS region");
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    if let Some(profile) = &aws.profile {
        trace!(profile = %profile, "using AWS profile");
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

/// Run an SDK future to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> std::result::Result<F::Output, String> {
    let rt = super::runtime().map_err(|e| format!("failed to create runtime: {}", e))?;
    Ok(rt.block_on(future))
}

/// Add the leading `/` SSM parameter names need.
pub(crate) fn parameter_name(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Split an S3 path into bucket and object key.
pub(crate) fn split_bucket_key(path: &str) -> Option<(&str, &str)> {
    let (bucket, key) = path.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}
