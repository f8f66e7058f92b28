//! Maps the workspace's coarse [`ErrorKind`] taxonomy onto gRPC status
//! codes.

use adir_core::{DirError, ErrorKind};
use tonic::Status;

pub fn to_status(err: DirError) -> Status {
    let kind = err.kind();
    let message = err.to_string();
    match kind {
        ErrorKind::NotFound => Status::not_found(message),
        ErrorKind::Conflict => Status::already_exists(message),
        ErrorKind::Invalid => Status::invalid_argument(message),
        ErrorKind::Unauthorized => Status::unauthenticated(message),
        ErrorKind::Unavailable => Status::unavailable(message),
        ErrorKind::Transient => {
            let mut status = Status::unavailable(message);
            status.metadata_mut().insert("retry", "true".parse().unwrap());
            status
        }
        // digest-mismatch is always reported verbatim, even at Fatal.
        ErrorKind::Fatal => Status::internal(message),
    }
}
