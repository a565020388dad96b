use rsbinder::{ExceptionCode, Status, StatusCode};

use crate::plat::transact::{MethodKind, ServiceKind};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PmError {
    /// The operation is deliberately not implemented by this crate.
    #[error("operation not supported")]
    Unsupported,
    /// A required argument was absent or empty.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    /// Wraps a Binder exception code, with the service specific code if any.
    #[error("Binder exception code {0:?}, {1:?}")]
    Binder(ExceptionCode, i32),
    /// Wraps a Binder status code.
    #[error("Binder transaction error {0:?}")]
    BinderTransaction(StatusCode),
    /// No transaction code is known for this method at the running SDK level.
    #[error("no transaction code for {method:?} on {service:?} at SDK {sdk}")]
    UnknownTransaction {
        service: ServiceKind,
        method: MethodKind,
        sdk: i32,
    },
    /// The shell grant command exited unsuccessfully.
    #[error("shell command exited with status {0}")]
    Shell(i32),
}

impl PmError {
    /// True for failures of the transport between this process and the
    /// service, as opposed to local argument or configuration errors.
    pub fn is_remote(&self) -> bool {
        matches!(self, PmError::Binder(..) | PmError::BinderTransaction(_))
    }
}

/// Converts a binder call result, keeping the exception code and the
/// optional service specific error.
pub fn map_binder_status<T>(r: rsbinder::status::Result<T>) -> Result<T, PmError> {
    r.map_err(|e| match e.exception_code() {
        ExceptionCode::ServiceSpecific => {
            PmError::Binder(ExceptionCode::ServiceSpecific, e.service_specific_error())
        }
        ExceptionCode::TransactionFailed => PmError::BinderTransaction(e.transaction_error()),
        e_code => PmError::Binder(e_code, 0),
    })
}

/// Maps a `PmError` back onto the wire for service implementations.
pub fn map_pm_error(e: PmError) -> Status {
    match e {
        PmError::Unsupported => Status::from(ExceptionCode::UnsupportedOperation),
        PmError::MissingArgument(_) => Status::from(ExceptionCode::NullPointer),
        PmError::Binder(ExceptionCode::ServiceSpecific, se) => {
            Status::new_service_specific_error(se, None)
        }
        PmError::Binder(ec, _) => Status::from(ec),
        PmError::BinderTransaction(sc) => Status::from(sc),
        PmError::UnknownTransaction { .. } => Status::from(StatusCode::UnknownTransaction),
        PmError::Shell(code) => Status::new_service_specific_error(code, None),
    }
}

/// Convert an [`anyhow::Error`] to a [`rsbinder::Status`]. A `PmError` root
/// cause keeps its mapping, anything else becomes an illegal state.
pub fn into_binder(e: anyhow::Error) -> Status {
    match e.root_cause().downcast_ref::<PmError>() {
        Some(pm) => map_pm_error(pm.clone()),
        None => Status::from(ExceptionCode::IllegalState),
    }
}
