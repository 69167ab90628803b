// Stream Provider System
//
// Polymorphic abstraction over video streaming vendors:
//
// - provider/traits: StreamProvider trait and the transient value objects
//   (tokens, channel descriptors, pricing tables, cost estimates)
// - provider/agora, provider/hundredms: concrete vendor implementations
//   (token signing, pricing, cost formulas, channel lifecycle)
// - provider/factory: name -> instance registry; the only construction point
//
// Controllers resolve a provider by name through the factory and delegate;
// the capacity calculators in service/capacity go through the same factory,
// so every algorithm stays provider-agnostic.

pub mod agora;
pub mod error;
pub mod factory;
pub mod hundredms;
pub mod traits;

pub use agora::AgoraProvider;
pub use error::{ProviderError, Result};
pub use factory::{ProviderBuilder, StreamProviderFactory};
pub use hundredms::HundredMsProvider;
pub use traits::*;

/// Channel name for a booth, derived deterministically from the booth id so
/// it is reconstructible without storage.
pub fn booth_channel_name(booth_id: &str) -> String {
    format!("booth-{booth_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booth_channel_name() {
        assert_eq!(booth_channel_name("42"), "booth-42");
        assert_eq!(
            booth_channel_name("6f9619ff-8b86-d011"),
            "booth-6f9619ff-8b86-d011"
        );
    }
}
