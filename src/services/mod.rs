pub mod best_sellers;
pub mod billing;
pub mod buy_now;
pub mod carts;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod reviews;
pub mod webhooks;

use crate::errors::ServiceError;
use crate::gateway::GatewayError;

/// Default mapping from provider errors to service errors. Charge
/// declines are handled separately in the payment service.
pub(crate) fn gateway_error(err: GatewayError) -> ServiceError {
    if err.is_not_found() {
        ServiceError::NotFound(err.to_string())
    } else {
        ServiceError::ExternalApiError(err.to_string())
    }
}
