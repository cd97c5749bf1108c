//! Exit status handling for application code run through [`crate::run`].

use std::{convert::Infallible, fmt::Debug, process};

/// A [`process::Termination`] whose success can be inspected before the process exits.
///
/// The GUI event loop owns the main thread and never returns, so [`crate::run`] has to call
/// [`process::exit`] itself once the application closure is done. This trait lets it pick the exit
/// code.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        self.as_ref().map_or(false, |term| term.is_success())
    }
}
