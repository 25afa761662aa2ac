//! In-memory object storage for exercising the validators.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use sha2::{Digest, Sha256};
use strum::IntoEnumIterator;
use testbed_storage::{ObjectStorage, PresignedTransfer, Result, StorageError, UploadedPart};
use url::Url;

use crate::permissions::{Account, BucketRole, Operation, copy_allowed, is_allowed};

/// Request kinds the access policy decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    HeadBucket,
    List,
    Read,
    Write,
    Delete,
    Copy { source: String },
}

/// Decides whether `account` may perform an action on a bucket.
pub type Policy = Arc<dyn Fn(&str, &Action, &str) -> bool + Send + Sync>;

/// Grants every request.
pub fn allow_all() -> Policy {
    Arc::new(|_: &str, _: &Action, _: &str| true)
}

/// Grants exactly what the permission matrix allows.
///
/// Account and bucket names must equal the lowercase role names.
pub fn matrix_policy() -> Policy {
    Arc::new(matrix_allows)
}

pub fn matrix_allows(account: &str, action: &Action, bucket: &str) -> bool {
    let (Some(account), Some(bucket)) = (parse_account(account), parse_bucket(bucket)) else {
        return false;
    };

    match action {
        Action::HeadBucket => is_allowed(account, bucket, Operation::HeadBucket),
        Action::List => is_allowed(account, bucket, Operation::ListObjects),
        Action::Read => is_allowed(account, bucket, Operation::PresignedDownload),
        Action::Write => is_allowed(account, bucket, Operation::MultipartUpload),
        Action::Delete => is_allowed(account, bucket, Operation::DeleteObject),
        Action::Copy { source } => parse_bucket(source)
            .is_some_and(|source| copy_allowed(account, source, bucket)),
    }
}

fn parse_account(name: &str) -> Option<Account> {
    Account::iter().find(|account| account.to_string() == name)
}

fn parse_bucket(name: &str) -> Option<BucketRole> {
    BucketRole::iter().find(|bucket| bucket.to_string() == name)
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), Vec<u8>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
}

struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

/// Shared storage that hands out one client per account.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    policy: Policy,
}

impl MemoryBackend {
    pub fn new(policy: Policy) -> Self {
        Self {
            state: Arc::default(),
            policy,
        }
    }

    pub fn client(&self, account: &str) -> MemoryStorage {
        MemoryStorage {
            account: account.to_string(),
            backend: self.clone(),
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn authorize(&self, operation: &'static str, account: &str, action: Action, bucket: &str) -> Result<()> {
        if (self.policy)(account, &action, bucket) {
            return Ok(());
        }
        Err(StorageError::Service {
            operation,
            reason: "AccessDenied: Access Denied".to_string(),
            status: Some(403),
        })
    }

    fn read(&self, operation: &'static str, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key).ok_or_else(|| StorageError::Service {
            operation,
            reason: "NoSuchKey: The specified key does not exist.".to_string(),
            status: Some(404),
        })
    }
}

/// One account's view of a [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryStorage {
    account: String,
    backend: MemoryBackend,
}

impl MemoryStorage {
    fn presign(&self, bucket: &str, key: &str, expiration: Duration, extra: &[(&str, String)]) -> String {
        let mut url = Url::parse(&format!("memory://{bucket}/{key}")).unwrap();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("account", &self.account)
                .append_pair("X-Amz-Date", &Timestamp::now().strftime("%Y%m%dT%H%M%SZ").to_string())
                .append_pair("X-Amz-Expires", &expiration.as_secs().to_string());
            for (name, value) in extra {
                query.append_pair(name, value);
            }
        }
        url.to_string()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn account(&self) -> &str {
        &self.account
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.backend
            .authorize("HeadBucket", &self.account, Action::HeadBucket, bucket)
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.backend
            .authorize("ListObjectsV2", &self.account, Action::List, bucket)?;
        let state = self.backend.lock();
        let mut keys: Vec<_> = state
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn upload_file_multipart(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _part_size: u64,
    ) -> Result<()> {
        self.backend
            .authorize("CreateMultipartUpload", &self.account, Action::Write, bucket)?;
        let body = std::fs::read(path)?;
        self.backend.insert(bucket, key, body);
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.backend
            .authorize("PutObject", &self.account, Action::Write, bucket)?;
        self.backend.insert(bucket, key, body.to_vec());
        Ok(())
    }

    async fn copy_object_multipart(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
        _part_size: u64,
    ) -> Result<()> {
        let action = Action::Copy {
            source: source_bucket.to_string(),
        };
        self.backend
            .authorize("UploadPartCopy", &self.account, action, target_bucket)?;
        let body = self.backend.read("HeadObject", source_bucket, source_key)?;
        self.backend.insert(target_bucket, target_key, body);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.backend
            .authorize("DeleteObject", &self.account, Action::Delete, bucket)?;
        self.backend
            .lock()
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn presigned_download_url(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<String> {
        Ok(self.presign(bucket, key, expiration, &[]))
    }

    async fn check_presigned_download(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<()> {
        let url = self.presign(bucket, key, expiration, &[]);
        self.probe(&url).await
    }

    async fn object_sha256(&self, bucket: &str, key: &str) -> Result<String> {
        self.backend
            .authorize("GetObject", &self.account, Action::Read, bucket)?;
        let body = self.backend.read("GetObject", bucket, key)?;
        Ok(hex::encode(Sha256::digest(body)))
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        self.backend
            .authorize("CreateMultipartUpload", &self.account, Action::Write, bucket)?;
        let mut state = self.backend.lock();
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presigned_upload_part_url(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiration: Duration,
    ) -> Result<String> {
        let extra = [
            ("uploadId", upload_id.to_string()),
            ("partNumber", part_number.to_string()),
        ];
        Ok(self.presign(bucket, key, expiration, &extra))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<()> {
        let mut state = self.backend.lock();
        let upload = state
            .uploads
            .remove(upload_id)
            .filter(|upload| upload.bucket == bucket && upload.key == key)
            .ok_or_else(|| StorageError::InvalidRequest("NoSuchUpload".into()))?;

        let mut body = Vec::new();
        for part in parts {
            let data = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StorageError::InvalidRequest("InvalidPart".into()))?;
            body.extend_from_slice(data);
        }
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.backend.lock().uploads.remove(upload_id);
        Ok(())
    }
}

/// Bucket, key, signer and query of a URL issued by [`MemoryStorage`].
struct SignedUrl {
    bucket: String,
    key: String,
    signer: String,
    query: HashMap<String, String>,
}

impl SignedUrl {
    fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| StorageError::InvalidRequest(e.to_string()))?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        Ok(Self {
            bucket: url.host_str().unwrap_or_default().to_string(),
            key: url.path().trim_start_matches('/').to_string(),
            signer: query.get("account").cloned().unwrap_or_default(),
            query,
        })
    }

    fn authorize(&self, backend: &MemoryBackend, action: Action) -> Result<()> {
        if (backend.policy)(&self.signer, &action, &self.bucket) {
            return Ok(());
        }
        Err(StorageError::UnexpectedStatus {
            status: 403,
            reason: "AccessDenied: Access Denied".to_string(),
        })
    }

    fn object(&self, backend: &MemoryBackend) -> Result<Vec<u8>> {
        backend
            .object(&self.bucket, &self.key)
            .ok_or_else(|| StorageError::UnexpectedStatus {
                status: 404,
                reason: "NoSuchKey: The specified key does not exist.".to_string(),
            })
    }
}

#[async_trait]
impl PresignedTransfer for MemoryStorage {
    async fn put_part(&self, url: &str, body: Vec<u8>) -> Result<String> {
        let url = SignedUrl::parse(url)?;
        url.authorize(&self.backend, Action::Write)?;

        let upload_id = url.query.get("uploadId").cloned().unwrap_or_default();
        let part_number: i32 = url
            .query
            .get("partNumber")
            .and_then(|n| n.parse().ok())
            .unwrap_or_default();

        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&body)));
        let mut state = self.backend.lock();
        let upload = state
            .uploads
            .get_mut(&upload_id)
            .ok_or_else(|| StorageError::UnexpectedStatus {
                status: 404,
                reason: "NoSuchUpload".to_string(),
            })?;
        upload.parts.insert(part_number, body);
        Ok(etag)
    }

    async fn get_range(&self, url: &str, range: RangeInclusive<u64>) -> Result<Bytes> {
        let url = SignedUrl::parse(url)?;
        url.authorize(&self.backend, Action::Read)?;
        let body = url.object(&self.backend)?;

        let start = *range.start() as usize;
        let end = (*range.end() as usize).min(body.len().saturating_sub(1));
        if start >= body.len() {
            return Err(StorageError::UnexpectedStatus {
                status: 416,
                reason: "InvalidRange".to_string(),
            });
        }
        Ok(Bytes::copy_from_slice(&body[start..=end]))
    }

    async fn download_to_file(&self, url: &str, path: &Path) -> Result<(u64, Duration)> {
        let start = Instant::now();
        let url = SignedUrl::parse(url)?;
        url.authorize(&self.backend, Action::Read)?;
        let body = url.object(&self.backend)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &body)?;
        Ok((body.len() as u64, start.elapsed()))
    }
}

/// Failures a [`FaultyTransfer`] injects.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Rejects the upload of the given part number with a 500.
    FailPart(i32),
    /// Flips the first byte of every file written by `download_to_file`.
    CorruptDownload,
    /// Serves the first two ranged downloads in swapped order.
    SwapFirstRanges,
}

/// A [`MemoryStorage`] transfer that misbehaves in one configured way.
pub struct FaultyTransfer {
    inner: MemoryStorage,
    fault: Fault,
    first_range: Mutex<Option<RangeInclusive<u64>>>,
}

impl FaultyTransfer {
    pub fn new(inner: MemoryStorage, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            first_range: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PresignedTransfer for FaultyTransfer {
    async fn put_part(&self, url: &str, body: Vec<u8>) -> Result<String> {
        if let Fault::FailPart(failing) = self.fault {
            let part_number = SignedUrl::parse(url)?
                .query
                .get("partNumber")
                .and_then(|n| n.parse::<i32>().ok());
            if part_number == Some(failing) {
                return Err(StorageError::UnexpectedStatus {
                    status: 500,
                    reason: "InternalError: We encountered an internal error.".to_string(),
                });
            }
        }
        self.inner.put_part(url, body).await
    }

    async fn get_range(&self, url: &str, range: RangeInclusive<u64>) -> Result<Bytes> {
        if !matches!(self.fault, Fault::SwapFirstRanges) {
            return self.inner.get_range(url, range).await;
        }

        let served = {
            let mut first = self.first_range.lock().unwrap();
            match first.clone() {
                None => {
                    let len = range.end() - range.start() + 1;
                    let second = (range.end() + 1)..=(range.end() + len);
                    *first = Some(range);
                    second
                }
                Some(first) if *range.start() == first.end() + 1 => first,
                Some(_) => range,
            }
        };
        self.inner.get_range(url, served).await
    }

    async fn download_to_file(&self, url: &str, path: &Path) -> Result<(u64, Duration)> {
        let result = self.inner.download_to_file(url, path).await?;
        if matches!(self.fault, Fault::CorruptDownload) {
            let mut content = std::fs::read(path)?;
            if let Some(byte) = content.first_mut() {
                *byte ^= 0xff;
            }
            std::fs::write(path, content)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_policy_follows_matrix() {
        assert!(matrix_allows("master", &Action::Write, "outbox"));
        assert!(!matrix_allows("ifrs", &Action::Write, "interrogation"));
        assert!(matrix_allows("dcs", &Action::Read, "outbox"));
        assert!(!matrix_allows("dcs", &Action::Read, "permanent"));
        assert!(matrix_allows(
            "ifrs",
            &Action::Copy {
                source: "interrogation".to_string()
            },
            "permanent"
        ));
        assert!(!matrix_allows("unknown", &Action::List, "outbox"));
    }

    #[tokio::test]
    async fn presigned_urls_carry_signer() {
        let backend = MemoryBackend::new(matrix_policy());
        backend.insert("outbox", "object", b"content".to_vec());

        let dcs = backend.client("dcs");
        let url = dcs
            .presigned_download_url("outbox", "object", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(&dcs.get_range(&url, 0..=2).await.unwrap()[..], b"con");

        let ifrs = backend.client("ifrs");
        let error = ifrs
            .check_presigned_download("outbox", "object", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(error.is_access_denied());
    }
}
