//! Pricing rule objects: the originators of monetary adjustments.
//!
//! Tax rates, enterprise fees, shipping methods and payment methods all
//! expose the same contract (compute an amount from a [`ChargeBasis`]) and
//! the fulfillment engine treats them uniformly.

pub mod calculator;
pub mod enterprise_fee;
pub mod order_cycle;
pub mod payment_method;
pub mod shipping;
pub mod tax_rate;
pub mod zone;

pub use calculator::{Calculator, ChargeBasis, FlatPercent, FlatRate, PerItem};
pub use enterprise_fee::{EnterpriseFee, EnterpriseFeeId, FeeType};
pub use order_cycle::{OrderCycle, OrderCycleId};
pub use payment_method::{PaymentMethod, PaymentMethodId};
pub use shipping::{ShippingMethod, ShippingMethodId};
pub use tax_rate::{TaxRate, TaxRateId};
pub use zone::{Address, Zone, ZoneId, ZoneMember};
