//! Resources every model gets for free.

use crate::Instant;
use crate::public::resource::polynomial::Polynomial;
use crate::public::resource::real::RealResource;

/// Seconds since the simulation origin.
pub fn clock() -> RealResource {
    RealResource::atom(|now| Polynomial::linear(now.now().since_origin().as_seconds_f64(), 1.0))
}

/// Seconds since `start`; negative before it.
pub fn elapsed_since(start: Instant) -> RealResource {
    RealResource::atom(move |now| {
        let offset = now.now().as_micros() as f64 - start.as_micros() as f64;
        Polynomial::linear(offset / 1e6, 1.0)
    })
}
