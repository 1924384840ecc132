//! Opaque engine handles.
//!
//! Handles are plain identifiers handed out by the engine. They carry no ownership on their own;
//! the session, statement and cursor types decide who releases what.

use std::fmt;

use serde::Serialize;

macro_rules! engine_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

engine_handle!(
    /// Process-wide runtime environment.
    EnvHandle
);
engine_handle!(
    /// One connection to a target database.
    ConnHandle
);
engine_handle!(
    /// Transaction, either autocommit-bound or explicit.
    TranHandle
);
engine_handle!(
    /// Statement / cursor created by a query request.
    StmtHandle
);
engine_handle!(
    /// Entry point of a diagnostic record chain.
    ErrorHandle
);
