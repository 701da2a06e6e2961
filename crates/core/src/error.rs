//! Mapping of domain errors onto [`AppError`].

use fundctl_shared::AppError;

use crate::budget::VersionError;
use crate::fiscal::FiscalError;
use crate::obligation::ObligationError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

macro_rules! into_app_error {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<$error> for AppError {
                fn from(err: $error) -> Self {
                    AppError::from_status(err.status_code(), err.to_string())
                }
            }
        )*
    };
}

into_app_error!(
    FiscalError,
    ObligationError,
    VersionError,
    WorkflowError,
    StoreError,
);
