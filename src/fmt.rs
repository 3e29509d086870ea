//! Logging macros. Messages go to [`defmt`] with the `defmt` feature, otherwise to the [`log`]
//! facade so host builds and tests can still be traced.
//!
//! Only use `{}` and `{:?}` placeholders, which both backends understand.
#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)+);
        #[cfg(not(feature = "defmt"))]
        ::log::trace!($($arg)+);
    }};
}

macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)+);
        #[cfg(not(feature = "defmt"))]
        ::log::debug!($($arg)+);
    }};
}

macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)+);
        #[cfg(not(feature = "defmt"))]
        ::log::info!($($arg)+);
    }};
}

macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)+);
        #[cfg(not(feature = "defmt"))]
        ::log::warn!($($arg)+);
    }};
}

macro_rules! error {
    ($($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)+);
        #[cfg(not(feature = "defmt"))]
        ::log::error!($($arg)+);
    }};
}
