use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Service path {0:?} was not understood")]
    DbusAddressError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why fetching a property of a remote object failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("bus error: {0}")]
    Bus(#[source] zbus::Error),
    #[error("remote error: {0}")]
    Remote(#[from] zbus::fdo::Error),
    #[error("unexpected value: {0}")]
    Decode(#[from] zbus::zvariant::Error),
}

impl From<zbus::Error> for FetchError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::FDO(e) => FetchError::Remote(*e),
            zbus::Error::MethodError(..) => FetchError::Remote(e.into()),
            zbus::Error::Variant(e) => FetchError::Decode(e),
            e => FetchError::Bus(e),
        }
    }
}
