//! [`ObjectStore`] over the AWS S3 API
//!
//! Works against AWS and S3-compatible servers such as MinIO. SDK-level
//! retries are disabled; `ArtifactCache` owns the retry policy, so every
//! failure surfaces here exactly once.

use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig as SdkRetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use pipecache_cache::{Error, ObjectStore, Result};
use secrecy::ExposeSecret;
use tracing::{debug, info};

const CREDENTIALS_PROVIDER: &str = "pipecache";

/// How a failed S3 call maps onto the cache error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The object (or bucket) does not exist
    Missing,
    /// Anything else: transport failures, timeouts, throttling, 5xx, auth
    Unavailable,
}

/// Classify a failure from its HTTP status and S3 error code
///
/// `status` is `None` when no response was received (dispatch failure,
/// timeout, construction failure).
#[must_use]
pub fn classify(status: Option<u16>, code: Option<&str>) -> FailureKind {
    match (status, code) {
        (_, Some("NoSuchKey" | "NotFound" | "NoSuchBucket")) | (Some(404), _) => {
            FailureKind::Missing
        }
        _ => FailureKind::Unavailable,
    }
}

fn failure_of<E: ProvideErrorMetadata>(err: &SdkError<E>) -> FailureKind {
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.as_service_error().and_then(ProvideErrorMetadata::code);
    classify(status, code)
}

fn unavailable<E>(operation: &str, key: Option<&str>, err: &SdkError<E>) -> Error
where
    E: std::error::Error + 'static,
{
    Error::store_unavailable(operation, key, DisplayErrorContext(err).to_string())
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Build a client from `config` and make sure the bucket exists
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let store = Self::new(config).await?;
        store.ensure_bucket_exists().await?;
        Ok(store)
    }

    /// Build a client from `config` without touching the network
    pub async fn new(config: &S3Config) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.expose_secret().to_string(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let sdk = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.operation_timeout)
            .connect_timeout(config.operation_timeout)
            .build();
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk)
            .force_path_style(config.force_path_style)
            .retry_config(SdkRetryConfig::disabled())
            .timeout_config(timeouts);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            bucket = %config.bucket,
            path_style = config.force_path_style,
            "Created S3 client"
        );
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }

    /// Bucket this store writes to
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }

    async fn ensure_bucket_exists(&self) -> Result<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!(bucket = %self.bucket, "Bucket exists");
                return Ok(());
            }
            Err(err) if failure_of(&err) == FailureKind::Missing => {}
            Err(err) => return Err(unavailable("head_bucket", None, &err)),
        }

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 is the implicit location and must not be sent explicitly
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, "Created cache bucket");
                Ok(())
            }
            // Lost a creation race with another worker
            Err(err)
                if err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                }) =>
            {
                debug!(bucket = %self.bucket, "Bucket created concurrently");
                Ok(())
            }
            Err(err) => Err(unavailable("create_bucket", None, &err)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if failure_of(&err) == FailureKind::Missing => Ok(false),
            Err(err) => Err(unavailable("exists", Some(key), &err)),
        }
    }

    async fn put_bytes(&self, key: &str, data: &[u8]) -> Result<()> {
        let content_type = if key.ends_with(pipecache_cache::key::METADATA_SUFFIX) {
            "application/json"
        } else {
            "application/octet-stream"
        };
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|err| unavailable("put", Some(key), &err))?;
        debug!(location = %self.location(key), size = data.len(), "Uploaded object");
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if failure_of(&err) == FailureKind::Missing => {
                return Err(Error::not_found(key));
            }
            Err(err) => return Err(unavailable("get", Some(key), &err)),
        };
        let body = output.body.collect().await.map_err(|e| {
            Error::store_unavailable("get", Some(key), format!("body stream failed: {e}"))
        })?;
        let data = body.into_bytes().to_vec();
        debug!(location = %self.location(key), size = data.len(), "Downloaded object");
        Ok(data)
    }
}
