use actix_multipart::Field;
use actix_web::web;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Path is required")]
    MissingPath,
    #[error("Path not allowed for this user")]
    PathNotAllowed,
    #[error("User has no organization")]
    NoOrganization,
    #[error("Invalid storage path: '{0}'")]
    InvalidPath(String),
    #[error("Link has expired")]
    Expired,
    #[error("Invalid signature")]
    BadSignature,
    #[error("Signing key rejected: {0}")]
    Key(String),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload failed: {0}")]
    Multipart(String),
    #[error("File is too large. Maximum size is {0}MB.")]
    TooLarge(u64),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

/// `scope` is the caller's data scope: `None` signs any path, otherwise the
/// organization id must appear as a whole segment. An empty scope is a
/// client without an organization and signs nothing.
pub fn authorize_sign_request(scope: Option<&str>, path: &str) -> Result<(), StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::MissingPath);
    }
    let Some(org) = scope else {
        return Ok(());
    };
    if org.is_empty() {
        return Err(StorageError::NoOrganization);
    }
    if path.split('/').any(|segment| segment == org) {
        Ok(())
    } else {
        Err(StorageError::PathNotAllowed)
    }
}

/// `None` or non-positive requests get the default; everything is capped at `max`.
pub fn clamp_expiry(requested: Option<i64>, default: i64, max: i64) -> i64 {
    match requested {
        Some(secs) if secs > 0 => secs.min(max),
        _ => default.min(max),
    }
}

/// Joins a bucket-relative path onto `root`, refusing anything but plain segments.
pub fn resolve_storage_path(root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let relative_path = Path::new(relative);
    if relative.is_empty() || relative.contains('\\') {
        return Err(StorageError::InvalidPath(relative.to_string()));
    }
    let plain = relative_path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !plain {
        return Err(StorageError::InvalidPath(relative.to_string()));
    }
    Ok(root.join(relative_path))
}

/// Bucket path for a calendar upload:
/// `org/{org|demo}/{year}/{month}/calendar/{post}/{folder}-{actor}-{file}`.
pub fn calendar_media_path(
    organization_id: Option<&str>,
    at: DateTime<Utc>,
    post_id: &str,
    folder: &str,
    actor: &str,
    file_name: &str,
) -> String {
    use chrono::Datelike;
    format!(
        "org/{}/{}/{}/calendar/{}/{}-{}-{}",
        organization_id.unwrap_or("demo"),
        at.year(),
        at.month(),
        post_id,
        folder,
        actor,
        file_name
    )
}

/// Removes a stored file that is no longer referenced. Failures are only logged.
pub async fn discard_file(path: PathBuf) {
    let display = path.display().to_string();
    match web::block(move || fs::remove_file(&path)).await {
        Ok(Ok(())) => log::info!("Discarded {}", display),
        Ok(Err(e)) => log::warn!("Could not remove {}: {}", display, e),
        Err(e) => log::error!("Blocking error removing {}: {}", display, e),
    }
}

/// Streams one multipart field to `target`, creating parent folders.
/// A partial file is removed when the size limit is exceeded.
pub async fn write_field(field: &mut Field, target: PathBuf, max_mb: u64) -> Result<u64, StorageError> {
    let max_bytes = max_mb.saturating_mul(1024 * 1024);
    if let Some(parent) = target.parent().map(Path::to_path_buf) {
        web::block(move || fs::create_dir_all(parent)).await??;
    }
    let mut file = web::block({
        let target = target.clone();
        move || fs::File::create(target)
    })
    .await??;

    let mut written: u64 = 0;
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| StorageError::Multipart(e.to_string()))?;
        written += data.len() as u64;
        if written > max_bytes {
            drop(file);
            discard_file(target).await;
            return Err(StorageError::TooLarge(max_mb));
        }
        file = web::block(move || file.write_all(&data).map(|_| file)).await??;
    }
    Ok(written)
}

/// HMAC-SHA256 signer for time-limited download links.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    pub fn new(key: &str) -> Self {
        UrlSigner { key: key.as_bytes().to_vec() }
    }

    fn mac(&self, path: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| StorageError::Key(e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, path: &str, expires: i64) -> Result<String, StorageError> {
        Ok(hex::encode(self.mac(path, expires)?.finalize().into_bytes()))
    }

    /// Expiry is checked before the signature.
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> Result<(), StorageError> {
        if expires <= now.timestamp() {
            return Err(StorageError::Expired);
        }
        let provided = hex::decode(signature).map_err(|_| StorageError::BadSignature)?;
        let expected = self.mac(path, expires)?.finalize().into_bytes();
        if expected.as_slice().ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(StorageError::BadSignature)
        }
    }

    /// Relative download URL: `/storage/{path}?expires=..&signature=..`.
    pub fn signed_url(&self, path: &str, expires: i64) -> Result<String, StorageError> {
        let signature = self.sign(path, expires)?;
        let mut url = Url::parse("http://portal.local/storage/")?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(path.to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        Ok(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
    }
}
