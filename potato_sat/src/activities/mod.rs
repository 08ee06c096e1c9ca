mod downlink;
mod recharge_potato;
mod science;

pub use downlink::Downlink;
pub use recharge_potato::RechargePotato;
pub use science::Science;
