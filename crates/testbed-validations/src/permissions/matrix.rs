//! Expected permissions of the archive accounts.
//!
//! ```text
//! Operation            master  ifrs (int/perm/out)  dcs (int/perm/out)
//! head bucket          all     Yes / Yes / Yes       -  / -  / Yes
//! list objects         all     Yes / Yes / Yes       -  / -  / Yes
//! multipart upload     all     -   / Yes / Yes       -  / -  / -
//! delete object        all     Yes / Yes / Yes       -  / -  / Yes
//! presigned download   all     -   / -   / -         -  / -  / Yes
//! ```
//!
//! Multipart copy is checked for interrogation to permanent, permanent to
//! outbox and interrogation to outbox. The master may copy between any two
//! buckets, ifrs only along the archive flow (interrogation to permanent,
//! permanent to outbox) and dcs never.

use strum::{Display, EnumIter, IntoStaticStr};

/// Account whose permissions are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Account {
    /// Administrative account with full access.
    Master,
    /// Internal file registry service.
    Ifrs,
    /// Download controller service.
    Dcs,
}

/// Logical role of a bucket in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BucketRole {
    /// Files waiting for validation.
    Interrogation,
    /// Archived files.
    Permanent,
    /// Files staged for download.
    Outbox,
}

/// Operation whose permission is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// `HeadBucket` on the bucket.
    HeadBucket,
    /// `ListObjectsV2` on the bucket.
    ListObjects,
    /// Multipart upload of a test file into the bucket.
    MultipartUpload,
    /// Multipart copy of an object between two buckets.
    MultipartCopy,
    /// Delete of an object in the bucket.
    DeleteObject,
    /// GET through a presigned URL signed by the account.
    PresignedDownload,
}

/// Bucket pairs checked for multipart copy, as (source, destination).
pub const COPY_PAIRS: [(BucketRole, BucketRole); 3] = [
    (BucketRole::Interrogation, BucketRole::Permanent),
    (BucketRole::Permanent, BucketRole::Outbox),
    (BucketRole::Interrogation, BucketRole::Outbox),
];

/// Returns whether `account` may perform `operation` on a bucket.
///
/// [`Operation::MultipartCopy`] involves two buckets; use [`copy_allowed`].
pub fn is_allowed(account: Account, bucket: BucketRole, operation: Operation) -> bool {
    use Account::*;
    use BucketRole::*;
    use Operation::*;

    match (account, operation, bucket) {
        (Master, _, _) => true,
        (_, MultipartCopy, _) => false,

        (Ifrs, HeadBucket | ListObjects | DeleteObject, _) => true,
        (Ifrs, MultipartUpload, Permanent | Outbox) => true,
        (Ifrs, MultipartUpload, Interrogation) => false,
        (Ifrs, PresignedDownload, _) => false,

        (Dcs, HeadBucket | ListObjects | DeleteObject | PresignedDownload, Outbox) => true,
        (Dcs, _, _) => false,
    }
}

/// Returns whether `account` may copy objects from `source` into `target`.
pub fn copy_allowed(account: Account, source: BucketRole, target: BucketRole) -> bool {
    use BucketRole::*;

    match account {
        Account::Master => source != target,
        Account::Ifrs => matches!(
            (source, target),
            (Interrogation, Permanent) | (Permanent, Outbox)
        ),
        Account::Dcs => false,
    }
}
