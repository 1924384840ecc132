use std::fmt;

/// Completion status reported by the engine for a request.
///
/// The ordering of the raw codes matters: everything at or above [`Status::Error`] is a failure,
/// everything below is some flavour of success. Codes outside the documented set are failures
/// whatever their value. [`Status::NoData`] is the end-of-results signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Success,
    Message,
    Warning,
    NoData,
    Error,
    Failure,
    NotInitialized,
    InvalidHandle,
    OutOfMemory,
    /// A code outside the documented set.
    Unknown(i32),
}

impl Status {
    /// Map a raw engine status code.
    #[must_use]
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Status::Success,
            1 => Status::Message,
            2 => Status::Warning,
            3 => Status::NoData,
            4 => Status::Error,
            5 => Status::Failure,
            6 => Status::NotInitialized,
            7 => Status::InvalidHandle,
            8 => Status::OutOfMemory,
            other => Status::Unknown(other),
        }
    }

    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Message => 1,
            Status::Warning => 2,
            Status::NoData => 3,
            Status::Error => 4,
            Status::Failure => 5,
            Status::NotInitialized => 6,
            Status::InvalidHandle => 7,
            Status::OutOfMemory => 8,
            Status::Unknown(code) => code,
        }
    }

    /// True for every status that must abort the current operation.
    #[must_use]
    pub fn is_failure(self) -> bool {
        match self {
            Status::Unknown(_) => true,
            known => known.as_raw() >= Status::Error.as_raw(),
        }
    }

    #[must_use]
    pub fn is_no_data(self) -> bool {
        self == Status::NoData
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("SUCCESS"),
            Status::Message => f.write_str("MESSAGE"),
            Status::Warning => f.write_str("WARNING"),
            Status::NoData => f.write_str("NO_DATA"),
            Status::Error => f.write_str("ERROR"),
            Status::Failure => f.write_str("FAILURE"),
            Status::NotInitialized => f.write_str("NOT_INITIALIZED"),
            Status::InvalidHandle => f.write_str("INVALID_HANDLE"),
            Status::OutOfMemory => f.write_str("OUT_OF_MEMORY"),
            Status::Unknown(code) => write!(f, "{code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_threshold() {
        for code in 0..=3 {
            assert!(!Status::from_raw(code).is_failure(), "code {code}");
        }
        for code in 4..=8 {
            assert!(Status::from_raw(code).is_failure(), "code {code}");
        }
        assert!(Status::from_raw(42).is_failure());
        assert!(Status::from_raw(-1).is_failure());
        assert!(Status::from_raw(i32::MIN).is_failure());
        assert!(Status::NoData.is_no_data());
    }

    #[test]
    fn raw_codes_are_stable() {
        for code in -1..12 {
            assert_eq!(Status::from_raw(code).as_raw(), code);
        }
    }
}
