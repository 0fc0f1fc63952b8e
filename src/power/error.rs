//! Error implementation

use thiserror::Error;

use super::Phase;

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Globals
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub type Result<T> = core::result::Result<T, Error>;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Errors
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// A denied shutdown approval is not an error, it comes back as
/// [`super::Approval::Deny`]. Everything here is either fatal or a
/// collaborator fault surfaced unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
  /// Fatal: the platform has no implementation for the requested phase.
  #[error("{0} phase is not implemented on this device!")]
  Unsupported(Phase),
  /// The board has no wake source of the requested kind.
  #[error("no such wake source!")]
  NoWakeSource,
  /// Input service fault.
  #[error("input service failure!")]
  Input,
  /// Timer service fault.
  #[error("timer service failure!")]
  Timer,
}
