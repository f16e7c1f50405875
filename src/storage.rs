//! Thin blob-store collaborators on top of the S3 client.
//!
//! No retry or backoff lives here; a failed call surfaces to the caller and
//! only affects the event being processed.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::info;

/// Downloads a blob into memory.
pub async fn download_blob(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<Vec<u8>> {
    let resp = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| format!("GetObject failed for s3://{bucket}/{key}"))?;

    let data = resp
        .body
        .collect()
        .await
        .with_context(|| format!("failed reading body of s3://{bucket}/{key}"))?;

    Ok(data.into_bytes().to_vec())
}

/// Uploads CSV bytes, optionally gzip-compressed (the key then gets a `.gz`
/// suffix).
pub async fn upload_csv(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    gzip: bool,
) -> Result<()> {
    let (body, key) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        (encoder.finish()?, format!("{key}.gz"))
    } else {
        (body, key.to_string())
    };

    client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(body))
        .content_type("text/csv")
        .send()
        .await
        .with_context(|| format!("PutObject failed for s3://{bucket}/{key}"))?;

    info!(bucket, key, "uploaded CSV to blob storage");
    Ok(())
}

/// Lists all object keys under `prefix`, following continuation tokens.
pub async fn list_keys(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
        let resp = client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation.take())
            .send()
            .await
            .with_context(|| format!("ListObjectsV2 failed for s3://{bucket}/{prefix}"))?;

        keys.extend(
            resp.contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string)),
        );

        match resp.next_continuation_token() {
            Some(token) => continuation = Some(token.to_string()),
            None => break,
        }
    }

    Ok(keys)
}
