pub mod gateway;
pub mod reconciler;
pub mod signature;

pub use gateway::{HttpGatewayClient, PaymentGateway};
#[cfg(any(test, feature = "test-utils"))]
pub use gateway::FakeGateway;
pub use reconciler::{GatewayNotification, PaymentReconciler, ReconcileOutcome};
pub use signature::SignatureVerifier;
