//! Storage backends for read-only pre-flight checks.

/// Existence-check primitive over a storage backend.
///
/// The pre-flight gate only ever asks "is anything there yet?"; it never
/// creates or deletes anything. Backend I/O errors fail the check rather
/// than being retried.
pub trait Storage {
    /// Whether anything exists at `path` in this backend.
    fn exists(&self, path: &str) -> Result<bool, anyhow::Error>;
}

/// Backend for paths on the local file system.
#[derive(Debug, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, path: &str) -> Result<bool, anyhow::Error> {
        Ok(std::path::Path::new(path).exists())
    }
}

/// Helper that returns whether `path` addresses an S3 bucket.
pub fn is_s3_path(path: &str) -> bool {
    path.starts_with("s3://")
}

/// Return the S3 configuration from environment variables.
pub async fn config_from_env() -> Result<aws_sdk_s3::config::Config, anyhow::Error> {
    let config = aws_config::from_env().load().await;
    let builder = aws_sdk_s3::config::Builder::from(&config);
    Ok(match std::env::var("AWS_ENDPOINT_URL") {
        Ok(endpoint_url) => {
            tracing::trace!("will use endpoint url {:?}", &endpoint_url);
            builder
                .endpoint_url(endpoint_url)
                .force_path_style(true)
                .build()
        }
        Err(_) => builder.build(),
    })
}

/// Backend for `s3://bucket/prefix` paths, configured from the environment.
#[derive(Debug, Default)]
pub struct S3Storage;

impl S3Storage {
    async fn prefix_exists(&self, path: &str) -> Result<bool, anyhow::Error> {
        let (bucket, key) = if let Some((bucket, key)) = path
            .trim_start_matches("s3://")
            .split_once('/')
        {
            (bucket.to_string(), key.to_string())
        } else {
            anyhow::bail!("invalid S3 path: {}", path);
        };

        tracing::debug!("will check bucket {:?} and prefix {:?}", &bucket, &key);

        let client = aws_sdk_s3::Client::from_conf(config_from_env().await?);
        let response = client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(format!("{}/", key.trim_end_matches('/')))
            .max_keys(1)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("could not list objects under {:?}: {}", path, e))?;

        Ok(response.key_count().unwrap_or_default() > 0)
    }
}

impl Storage for S3Storage {
    fn exists(&self, path: &str) -> Result<bool, anyhow::Error> {
        // The gate runs on the single submission thread, so drive the async
        // client through a throw-away current-thread runtime.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.prefix_exists(path))
    }
}

/// Select the storage backend for `path` by its scheme.
pub fn storage_for_path(path: &str) -> Box<dyn Storage> {
    if is_s3_path(path) {
        Box::new(S3Storage)
    } else {
        Box::new(LocalStorage)
    }
}
