//! Streaming audio sample rate conversion.
//!
//! The crate converts interleaved `f32` audio from one sample rate to another with one of five
//! interpolators, from band limited sinc interpolation at three quality levels down to linear and
//! zero order hold interpolation.
//!
//! Conversion is stateful: a [`Converter`] is fed arbitrarily sized blocks of input over time and
//! returns, per call, how many input frames it consumed and how many output frames it produced.
//! Unconsumed input has to be offered again on the next call. The ratio may change between calls,
//! in which case the converter glides from the old to the new ratio over the produced output.
//!
//! ```rust
//! use secretrabbit::{Converter, ConverterType};
//!
//! let mut converter = Converter::new(ConverterType::SincFastest, 1).unwrap();
//! let input = vec![0.0f32; 480];
//! let mut output = vec![0.0f32; 1024];
//!
//! let (consumed, produced) = converter.process(&input, &mut output, 2.0, true).unwrap();
//! println!("Consumed {consumed} frames and produced {produced} frames");
//! ```
//!
//! For whole buffers the one shot [`convert_once`] does all of this in a single call, and
//! [`CallbackConverter`] pulls its input from a closure instead.
mod callback;
mod converter;
mod error;
mod fir;
mod hold;
mod linear;
mod sample;
mod simple;
mod sinc;
mod window;

use std::{borrow::Cow, fmt, str::FromStr};

pub use callback::CallbackConverter;
pub use converter::{Converter, MAX_RATIO, MIN_RATIO, is_valid_ratio};
pub use error::{Error, ErrorCode, Result};
pub use sample::{float_to_int, float_to_short, int_to_float, short_to_float};
pub use simple::convert_once;
pub use sinc::FilterSpec;

const UNKNOWN_CONVERTER: &str = "unknown samplerate converter";

/// All interpolators a converter can be opened with.
///
/// The discriminants are the stable numeric identifiers of the interpolators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ConverterType {
    /// Band limited sinc interpolation with the longest filter and the narrowest transition band.
    SincBestQuality = 0,
    /// Band limited sinc interpolation, a compromise between quality and speed.
    SincMediumQuality = 1,
    /// Band limited sinc interpolation with the shortest filter.
    SincFastest = 2,
    /// Repeats the most recent input frame.
    ZeroOrderHold = 3,
    /// Linear interpolation between the two bracketing input frames.
    Linear = 4,
}

impl ConverterType {
    /// All interpolators, ordered by their numeric identifier.
    pub const ALL: [ConverterType; 5] = [
        ConverterType::SincBestQuality,
        ConverterType::SincMediumQuality,
        ConverterType::SincFastest,
        ConverterType::ZeroOrderHold,
        ConverterType::Linear,
    ];

    /// Returns the stable numeric identifier.
    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Returns the display name of the interpolator.
    pub const fn name(self) -> &'static str {
        match self {
            ConverterType::SincBestQuality => "Best Sinc Interpolator",
            ConverterType::SincMediumQuality => "Medium Sinc Interpolator",
            ConverterType::SincFastest => "Fastest Sinc Interpolator",
            ConverterType::ZeroOrderHold => "ZOH Interpolator",
            ConverterType::Linear => "Linear Interpolator",
        }
    }

    /// Returns a one sentence description of the interpolator.
    pub const fn description(self) -> &'static str {
        match self {
            ConverterType::SincBestQuality => {
                "Band limited sinc interpolation, best quality, 144dB SNR, 96% bandwidth."
            }
            ConverterType::SincMediumQuality => {
                "Band limited sinc interpolation, medium quality, 121dB SNR, 90% bandwidth."
            }
            ConverterType::SincFastest => {
                "Band limited sinc interpolation, fastest, 97dB SNR, 80% bandwidth."
            }
            ConverterType::ZeroOrderHold => {
                "Zero order hold interpolator, very fast, poor quality."
            }
            ConverterType::Linear => "Linear interpolator, very fast, poor quality.",
        }
    }

    /// Returns the short name accepted by [`FromStr`].
    pub const fn short_name(self) -> &'static str {
        match self {
            ConverterType::SincBestQuality => "best",
            ConverterType::SincMediumQuality => "medium",
            ConverterType::SincFastest => "fastest",
            ConverterType::ZeroOrderHold => "zoh",
            ConverterType::Linear => "linear",
        }
    }

    /// The filter of a sinc interpolator, `None` for the other converters.
    pub fn filter_spec(self) -> Option<FilterSpec> {
        match self {
            ConverterType::SincBestQuality => Some(FilterSpec::BEST),
            ConverterType::SincMediumQuality => Some(FilterSpec::MEDIUM),
            ConverterType::SincFastest => Some(FilterSpec::FASTEST),
            ConverterType::ZeroOrderHold | ConverterType::Linear => None,
        }
    }
}

impl fmt::Display for ConverterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl TryFrom<i32> for ConverterType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        ConverterType::ALL
            .into_iter()
            .find(|converter_type| converter_type.id() == value)
            .ok_or_else(|| Error::with_detail(ErrorCode::BadConverter, format!("id={value}")))
    }
}

impl From<ConverterType> for i32 {
    fn from(value: ConverterType) -> Self {
        value.id()
    }
}

impl FromStr for ConverterType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        ConverterType::ALL
            .into_iter()
            .find(|converter_type| converter_type.short_name().eq_ignore_ascii_case(value))
            .ok_or_else(|| Error::with_detail(ErrorCode::BadConverter, format!("name={value}")))
    }
}

/// A raw numeric converter identifier, which may or may not name a known interpolator.
///
/// Used where identifiers arrive from outside the type system. Unknown identifiers resolve to the
/// sentinel name and description instead of failing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConverterId(pub i32);

impl ConverterId {
    /// Resolves the identifier to an interpolator.
    pub fn resolve(self) -> Result<ConverterType> {
        ConverterType::try_from(self.0)
    }

    /// Returns the interpolator name, or `unknown samplerate converter (<id>)`.
    pub fn name(self) -> Cow<'static, str> {
        match self.resolve() {
            Ok(converter_type) => Cow::Borrowed(converter_type.name()),
            Err(_) => Cow::Owned(format!("{UNKNOWN_CONVERTER} ({})", self.0)),
        }
    }

    /// Returns the interpolator description, or `unknown samplerate converter`.
    pub fn description(self) -> &'static str {
        match self.resolve() {
            Ok(converter_type) => converter_type.description(),
            Err(_) => UNKNOWN_CONVERTER,
        }
    }
}

impl From<ConverterType> for ConverterId {
    fn from(value: ConverterType) -> Self {
        ConverterId(value.id())
    }
}

impl From<i32> for ConverterId {
    fn from(value: i32) -> Self {
        ConverterId(value)
    }
}

/// Returns the version tag of the conversion engine.
pub fn library_version() -> &'static str {
    concat!("secretrabbit-", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_names() {
        assert_eq!(ConverterType::Linear.name(), "Linear Interpolator");
        assert_eq!(ConverterType::ZeroOrderHold.name(), "ZOH Interpolator");
        assert_eq!(ConverterType::SincBestQuality.to_string(), "Best Sinc Interpolator");
        for converter_type in ConverterType::ALL {
            assert!(!converter_type.name().is_empty());
            assert!(!converter_type.description().is_empty());
        }
    }

    #[test]
    fn test_identifiers_round_trip() {
        for (index, converter_type) in ConverterType::ALL.into_iter().enumerate() {
            assert_eq!(converter_type.id(), index as i32);
            assert_eq!(ConverterType::try_from(index as i32), Ok(converter_type));
            assert_eq!(ConverterId::from(converter_type).resolve(), Ok(converter_type));
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let error = ConverterType::try_from(5).unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadConverter);
        assert_eq!(error.detail(), Some("id=5"));

        let unknown = ConverterId(-1);
        assert_eq!(unknown.name(), "unknown samplerate converter (-1)");
        assert_eq!(unknown.description(), "unknown samplerate converter");

        let unknown = ConverterId(42);
        assert!(unknown.name().contains("42"));
        assert!(!unknown.description().contains("42"));
    }

    #[test]
    fn test_known_identifier_lookup() {
        assert_eq!(ConverterId(4).name(), "Linear Interpolator");
        assert_eq!(
            ConverterId(2).description(),
            ConverterType::SincFastest.description()
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("best".parse::<ConverterType>(), Ok(ConverterType::SincBestQuality));
        assert_eq!("Medium".parse::<ConverterType>(), Ok(ConverterType::SincMediumQuality));
        assert_eq!(" fastest ".parse::<ConverterType>(), Ok(ConverterType::SincFastest));
        assert_eq!("zoh".parse::<ConverterType>(), Ok(ConverterType::ZeroOrderHold));
        assert_eq!("LINEAR".parse::<ConverterType>(), Ok(ConverterType::Linear));

        let error = "cubic".parse::<ConverterType>().unwrap_err();
        assert_eq!(error.code(), ErrorCode::BadConverter);
    }

    #[test]
    fn test_filter_specs() {
        assert_eq!(
            ConverterType::SincMediumQuality.filter_spec(),
            Some(FilterSpec::MEDIUM)
        );
        assert_eq!(ConverterType::Linear.filter_spec(), None);
        assert_eq!(ConverterType::ZeroOrderHold.filter_spec(), None);
    }

    #[test]
    fn test_library_version() {
        let version = library_version();
        assert!(version.starts_with("secretrabbit-"));
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }
}
