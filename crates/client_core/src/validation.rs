//! Admission checks run before any network work is spent on a submission.

use shared::domain::{Parameters, SubmissionInput, MAX_INPUT_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingInput,
    TooLarge,
    InvalidPixelSize,
    NotAnImage,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MissingInput => "missing input",
            RejectReason::TooLarge => "too large",
            RejectReason::InvalidPixelSize => "invalid pixel size",
            RejectReason::NotAnImage => "not an image",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            RejectReason::MissingInput => "Please select an image",
            RejectReason::TooLarge => "Image file is too large (Max 10MB)",
            RejectReason::InvalidPixelSize => "Pixel size must be greater than 0",
            RejectReason::NotAnImage => "Selected file is not an image",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks run in priority order; the first failing one wins. The palette
/// needs no check since `PaletteId` only holds catalog entries. On success the
/// admitted input is handed back.
pub fn validate<'a>(
    input: Option<&'a SubmissionInput>,
    parameters: &Parameters,
) -> Result<&'a SubmissionInput, RejectReason> {
    let Some(input) = input else {
        return Err(RejectReason::MissingInput);
    };
    if input.size() > MAX_INPUT_BYTES {
        return Err(RejectReason::TooLarge);
    }
    if parameters.pixel_size < 1 {
        return Err(RejectReason::InvalidPixelSize);
    }
    if !input.is_image() {
        return Err(RejectReason::NotAnImage);
    }
    Ok(input)
}
