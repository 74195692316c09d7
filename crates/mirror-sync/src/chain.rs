//! Version chain walking.
//!
//! Reconstructs the ordered run of historical versions an add-chain has to
//! materialize. Works on the arena representation of a history
//! ([`AttachmentHistory`]), so a missing link is a contiguity check rather
//! than a dangling reference chase.

use mirror_data::{AttachmentHistory, AttachmentVersion};

use crate::{Error, Result};

/// Returns versions `from_version..=head`, oldest first.
///
/// Fails with [`Error::ChainIncomplete`] when the history does not hold a
/// contiguous run down to `from_version`: the fetch materialized too little
/// history, which must surface rather than silently shorten the chain.
/// `from_version` outside `1..=head` is a caller bug and reported as
/// [`Error::InvalidWalkBound`].
pub fn walk(history: &AttachmentHistory, from_version: u32) -> Result<&[AttachmentVersion]> {
    let head = history.head_version();
    if from_version == 0 || from_version > head {
        return Err(Error::InvalidWalkBound {
            file_name: history.file_name().to_string(),
            from_version,
            head_version: head,
        });
    }

    let versions = history.versions();
    let start = versions.partition_point(|v| v.version < from_version);
    let tail = &versions[start..];

    // Sorted and duplicate-free by construction, so contiguity means each
    // element is exactly one ahead of the previous.
    let mut expected = from_version;
    for version in tail {
        if version.version != expected {
            return Err(Error::ChainIncomplete {
                file_name: history.file_name().to_string(),
                missing_version: expected,
            });
        }
        expected += 1;
    }

    Ok(tail)
}
