//! Low-rent error type for the core: no allocation, no `std`.
//!
//! A `Display`-able wrapper with blanket `From` impls at the conversion
//! seams, but a fixed set of variants instead of a formatted message, since
//! `ook-core` must build without `alloc`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A bounded collection (`heapless::Vec` et al.) is already full.
    Capacity,
    /// Textual input did not match the expected grammar.
    Syntax,
    /// Textual input contained a number out of range or malformed.
    Number,
    /// Input was not valid UTF-8.
    Encoding,
    /// A duration, count or index was outside its required range.
    OutOfRange,
    /// A setting key or value failed validation.
    InvalidSetting,
    /// No device plugin is registered under the requested name.
    UnknownDevice,
    /// A pulse train has no classifiable bins (fewer than 2 bins).
    Unclassifiable,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::Capacity => "capacity exceeded",
            Error::Syntax => "syntax error",
            Error::Number => "invalid number",
            Error::Encoding => "invalid encoding",
            Error::OutOfRange => "value out of range",
            Error::InvalidSetting => "invalid setting",
            Error::UnknownDevice => "unknown device",
            Error::Unclassifiable => "pulse train is not classifiable",
        };
        f.write_str(s)
    }
}

impl From<core::num::ParseIntError> for Error {
    fn from(_: core::num::ParseIntError) -> Self {
        Error::Number
    }
}

impl From<core::num::ParseFloatError> for Error {
    fn from(_: core::num::ParseFloatError) -> Self {
        Error::Number
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(_: core::str::Utf8Error) -> Self {
        Error::Encoding
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(_: nom::Err<nom::error::Error<&str>>) -> Self {
        Error::Syntax
    }
}
