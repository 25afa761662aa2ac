//! Multipart part sizing and byte ranges.

use std::ops::RangeInclusive;

use crate::{Error, MIB, Result, TRACING_TARGET_PARTS};

/// Smallest part size S3 accepts for all but the last part.
pub const MIN_PART_SIZE: u64 = 5 * MIB;

/// Largest part size S3 accepts.
pub const MAX_PART_SIZE: u64 = 5 * 1024 * MIB;

/// Part limit used when sizing uploads.
///
/// S3 allows 10 000 parts; encryption grows the file by about 0.043 %, so
/// five parts are held back for the overhead.
pub const MAX_PART_COUNT: u64 = 9_995;

/// Converts a part size in MiB into bytes that fit the multipart limits.
///
/// The size is clamped to [`MIN_PART_SIZE`]..=[`MAX_PART_SIZE`]. When the file
/// would still need more than [`MAX_PART_COUNT`] parts, the first power of
/// two between 8 MiB and 4096 MiB that is larger and brings the count down is
/// used instead.
///
/// # Errors
///
/// Returns [`Error::PartSize`] if no candidate keeps the part count in bounds.
pub fn adjust_part_size(part_size_mib: u64, file_size: u64) -> Result<u64> {
    let mut part_size = part_size_mib
        .saturating_mul(MIB)
        .clamp(MIN_PART_SIZE, MAX_PART_SIZE);

    if !fits_part_limit(file_size, part_size) {
        part_size = (3..13)
            .map(|exp| (1u64 << exp) * MIB)
            .find(|&candidate| candidate > part_size && fits_part_limit(file_size, candidate))
            .ok_or(Error::PartSize { file_size })?;
    }

    if part_size != part_size_mib.saturating_mul(MIB) {
        tracing::info!(
            target: TRACING_TARGET_PARTS,
            from_mib = part_size_mib,
            to_mib = part_size / MIB,
            "Part size was adjusted from {}MiB to {}MiB",
            part_size_mib,
            part_size / MIB,
        );
    }

    Ok(part_size)
}

/// Returns whether `file_size / part_size` stays within [`MAX_PART_COUNT`].
fn fits_part_limit(file_size: u64, part_size: u64) -> bool {
    file_size <= part_size * MAX_PART_COUNT
}

/// Returns the number of parts needed for `size` bytes.
pub fn part_count(size: u64, part_size: u64) -> u64 {
    size.div_ceil(part_size)
}

/// Returns inclusive byte ranges covering `file_size` bytes in parts.
///
/// All ranges span `part_size` bytes except the last, which may be shorter.
pub fn part_ranges(file_size: u64, part_size: u64) -> Vec<RangeInclusive<u64>> {
    (0..part_count(file_size, part_size))
        .map(|index| {
            let start = index * part_size;
            let end = (start + part_size).min(file_size) - 1;
            start..=end
        })
        .collect()
}
