//! Domain vocabulary shared by services and handlers.

pub mod audit;
pub mod calendar;
pub mod delivery;
pub mod inventory;
pub mod order;
pub mod payment;

pub use audit::AuditAction;
pub use delivery::EnvioStatus;
pub use inventory::{ledger_balance, MovementReason, MovementType, Unit};
pub use order::{order_total, OrderStatus, ShippingMethod};
pub use payment::{from_cents, to_cents, PaymentMethod, PaymentSummary};
