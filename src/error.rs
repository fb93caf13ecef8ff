use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The closed set of failure kinds the converters can report.
///
/// The numeric codes are stable and can be matched on by callers that need a machine readable
/// value (see [`ErrorCode::code`]). Codes that only describe null pointers, missing callbacks or
/// misuse of a C style calling convention cannot occur with slices and closures and have no
/// variant, so [`ErrorCode::from_code`] returns `None` for them.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCode {
    /// An internal buffer could not be allocated.
    MallocFailed,
    /// The converter has been closed.
    BadState,
    /// A buffer does not hold a whole number of frames.
    BadData,
    /// A buffer is too short for the samples requested.
    BadDataPtr,
    /// The conversion ratio is outside of `[1/256, 256]`.
    BadSrcRatio,
    /// The converter identifier is unknown.
    BadConverter,
    /// The channel count is zero.
    BadChannelCount,
    /// The sinc history buffer size could not be computed.
    SincBadBufferLen,
    /// Input was offered to a sinc converter after its stream was terminated.
    BadSincState,
    /// Input and output buffers overlap.
    DataOverlap,
    /// The sinc history buffer refill arithmetic went out of range.
    SincPrepareDataBadLen,
    /// The converter state is inconsistent.
    BadInternalState,
}

impl ErrorCode {
    /// All error codes, in ascending numeric order.
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::MallocFailed,
        ErrorCode::BadState,
        ErrorCode::BadData,
        ErrorCode::BadDataPtr,
        ErrorCode::BadSrcRatio,
        ErrorCode::BadConverter,
        ErrorCode::BadChannelCount,
        ErrorCode::SincBadBufferLen,
        ErrorCode::BadSincState,
        ErrorCode::DataOverlap,
        ErrorCode::SincPrepareDataBadLen,
        ErrorCode::BadInternalState,
    ];

    /// Returns the stable numeric code.
    pub const fn code(self) -> i32 {
        match self {
            ErrorCode::MallocFailed => 1,
            ErrorCode::BadState => 2,
            ErrorCode::BadData => 3,
            ErrorCode::BadDataPtr => 4,
            ErrorCode::BadSrcRatio => 6,
            ErrorCode::BadConverter => 10,
            ErrorCode::BadChannelCount => 11,
            ErrorCode::SincBadBufferLen => 12,
            ErrorCode::BadSincState => 15,
            ErrorCode::DataOverlap => 16,
            ErrorCode::SincPrepareDataBadLen => 21,
            ErrorCode::BadInternalState => 22,
        }
    }

    /// Looks up the error kind for a numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|error_code| error_code.code() == code)
    }

    /// Returns the fixed human readable description of the error kind.
    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::MallocFailed => "Malloc failed.",
            ErrorCode::BadState => "Converter has already been closed.",
            ErrorCode::BadData => "Buffer length is not a whole number of frames.",
            ErrorCode::BadDataPtr => "Buffer is too short for the requested number of samples.",
            ErrorCode::BadSrcRatio => "SRC ratio outside [1/256, 256] range.",
            ErrorCode::BadConverter => "Bad converter number.",
            ErrorCode::BadChannelCount => "Channel count must be >= 1.",
            ErrorCode::SincBadBufferLen => "Internal error. Bad buffer length.",
            ErrorCode::BadSincState => "Converter received input after end of input without reset.",
            ErrorCode::DataOverlap => "Input and output data arrays overlap.",
            ErrorCode::SincPrepareDataBadLen => "Internal error : Bad length in prepare_data.",
            ErrorCode::BadInternalState => "Error : Someone is trampling on my internal state.",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.description().fmt(f)
    }
}

impl core::fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ErrorCode::MallocFailed => "MallocFailed",
            ErrorCode::BadState => "BadState",
            ErrorCode::BadData => "BadData",
            ErrorCode::BadDataPtr => "BadDataPtr",
            ErrorCode::BadSrcRatio => "BadSrcRatio",
            ErrorCode::BadConverter => "BadConverter",
            ErrorCode::BadChannelCount => "BadChannelCount",
            ErrorCode::SincBadBufferLen => "SincBadBufferLen",
            ErrorCode::BadSincState => "BadSincState",
            ErrorCode::DataOverlap => "DataOverlap",
            ErrorCode::SincPrepareDataBadLen => "SincPrepareDataBadLen",
            ErrorCode::BadInternalState => "BadInternalState",
        };
        write!(f, "{name}({})", self.code())
    }
}

/// Error returned by every fallible operation of the crate.
///
/// Carries the [`ErrorCode`], whose description is always part of the rendered message, and an
/// optional free form detail appended in parentheses, for example
/// `SRC ratio outside [1/256, 256] range. (ratio=-5.3)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{}{}", .code, detail_suffix(.detail))]
pub struct Error {
    code: ErrorCode,
    detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

impl Error {
    /// Creates an error without contextual detail.
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    /// Creates an error carrying contextual detail.
    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    /// The failure kind.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The fixed description of the failure kind.
    pub fn description(&self) -> &'static str {
        self.code.description()
    }

    /// Contextual detail, such as the offending value.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_detail() {
        let error = Error::new(ErrorCode::BadConverter);
        assert_eq!(error.to_string(), "Bad converter number.");
        assert_eq!(error.detail(), None);
    }

    #[test]
    fn test_display_with_detail() {
        let error = Error::with_detail(ErrorCode::BadSrcRatio, "ratio=-5.3");
        assert_eq!(
            error.to_string(),
            "SRC ratio outside [1/256, 256] range. (ratio=-5.3)"
        );
        assert_eq!(error.detail(), Some("ratio=-5.3"));
        assert_eq!(error.code(), ErrorCode::BadSrcRatio);
    }

    #[test]
    fn test_description_is_stable_substring() {
        for code in ErrorCode::ALL {
            let plain = Error::new(code).to_string();
            let detailed = Error::with_detail(code, "context").to_string();
            assert!(
                detailed.contains(code.description()) && plain == code.description(),
                "Description of {code:?} must be a stable substring, got {detailed:?}"
            );
        }
    }

    #[test]
    fn test_codes_are_unique_and_round_trip() {
        for (index, code) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(ErrorCode::from_code(code.code()), Some(*code));
            for other in &ErrorCode::ALL[index + 1..] {
                assert_ne!(code.code(), other.code());
            }
        }
        assert_eq!(ErrorCode::from_code(0), None);
        assert_eq!(ErrorCode::from_code(5), None);
    }

    #[test]
    fn test_pointer_and_callback_codes_have_no_variant() {
        for code in [5, 7, 8, 9, 13, 14, 17, 18, 19, 20] {
            assert_eq!(ErrorCode::from_code(code), None, "Code {code} should be unmapped");
        }
    }

    #[test]
    fn test_accessors() {
        let error = Error::with_detail(ErrorCode::MallocFailed, "len=8");
        assert_eq!(error.code(), ErrorCode::MallocFailed);
        assert_eq!(error.description(), ErrorCode::MallocFailed.description());
        assert_eq!(error.detail(), Some("len=8"));
    }

    #[test]
    fn test_debug_names_code() {
        assert_eq!(format!("{:?}", ErrorCode::BadSrcRatio), "BadSrcRatio(6)");
    }
}
