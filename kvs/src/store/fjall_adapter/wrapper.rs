use crate::errors::{ErrorKind, KvsError};
use std::error::Error;

/// Maps a storage engine error onto the crate's error kinds by inspecting its
/// message.
pub(crate) fn to_kvs_error(error: impl Error) -> KvsError {
    let error_msg = error.to_string();
    let lowered = error_msg.to_lowercase();
    let error_kind = if lowered.contains("closed") || lowered.contains("poisoned") {
        ErrorKind::StoreAlreadyClosed
    } else if lowered.contains("permission") {
        ErrorKind::PermissionDenied
    } else if lowered.contains("not found") || lowered.contains("deleted") {
        ErrorKind::FileNotFound
    } else {
        ErrorKind::BackendError
    };
    KvsError::new(&format!("Fjall error: {}", error_msg), error_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_closed_maps_to_store_already_closed() {
        let err = to_kvs_error(io::Error::other("keyspace is closed"));
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
        assert!(err.message().starts_with("Fjall error: "));
    }

    #[test]
    fn test_permission_maps_to_permission_denied() {
        let err = to_kvs_error(io::Error::other("Permission denied (os error 13)"));
        assert_eq!(err.kind(), &ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_missing_partition_maps_to_file_not_found() {
        let err = to_kvs_error(io::Error::other("PartitionDeleted"));
        assert_eq!(err.kind(), &ErrorKind::FileNotFound);
    }

    #[test]
    fn test_everything_else_is_a_backend_error() {
        let err = to_kvs_error(io::Error::other("checksum mismatch, data may be corrupt"));
        assert_eq!(err.kind(), &ErrorKind::BackendError);
    }
}
