//! Capability traits the payment flow depends on but does not implement.

use std::sync::Arc;

use crate::transport::{PaymentAuthorization, PaymentRequirements};

/// The wallet-side collaborator that turns payment terms into a spendable authorization.
///
/// Key management and signing are entirely up to the implementor. Authorizing may
/// require interactive confirmation, so the returned future can stay pending for an
/// arbitrary time; callers that need to bound it must do so explicitly.
///
/// Returning an error means the payer declined; the client will not retry.
pub trait PayerIdentity {
    type Error: std::error::Error + Send + Sync + 'static;

    fn authorize(
        &self,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = Result<PaymentAuthorization, Self::Error>> + Send;
}

impl<P: PayerIdentity + Send + Sync> PayerIdentity for Arc<P> {
    type Error = P::Error;

    fn authorize(
        &self,
        requirements: &PaymentRequirements,
    ) -> impl Future<Output = Result<PaymentAuthorization, Self::Error>> + Send {
        (**self).authorize(requirements)
    }
}
