use shared::error::ErrorDescriptor;

use crate::{transport::TransportError, validation::RejectReason};

/// Maps a transport outcome onto the user-facing error taxonomy.
pub fn classify(err: &TransportError) -> ErrorDescriptor {
    match err {
        TransportError::TimedOut => ErrorDescriptor::timeout(),
        TransportError::Rejected {
            status,
            message: Some(message),
        } if (400..500).contains(status) && !message.trim().is_empty() => {
            ErrorDescriptor::client_rejected(message.clone())
        }
        TransportError::Rejected { .. }
        | TransportError::Status(_)
        | TransportError::Network(_)
        | TransportError::MalformedResponse(_) => ErrorDescriptor::unknown(),
    }
}

pub fn classify_rejection(reason: RejectReason) -> ErrorDescriptor {
    ErrorDescriptor::validation(reason.user_message())
}
