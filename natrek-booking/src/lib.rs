pub mod ledger;
pub mod lifecycle;
pub mod mover;
pub mod payments;

pub use ledger::CapacityLedger;
pub use lifecycle::BookingService;
pub use mover::BookingMover;
pub use payments::PaymentGate;
