//! External capabilities consumed through narrow interfaces.
//!
//! The coordinator never talks to a network client directly; it sees these
//! traits. Real backends live in [`http`], fakes live with the tests.

pub mod http;
pub mod suggestion;

pub use suggestion::SuggestionResolver;

use async_trait::async_trait;

use crate::errors::ResolverError;
use crate::models::Address;

/// Detects the address of the current location.
#[async_trait]
pub trait LocationCapability: Send + Sync {
    async fn detect_current_address(&self) -> Result<Address, ResolverError>;
}

/// Kicks off a weather refresh for an address. Fire-and-forget from the
/// coordinator's perspective.
#[async_trait]
pub trait WeatherCapability: Send + Sync {
    async fn refresh(&self, address: &Address) -> Result<(), ResolverError>;
}

/// Speaks finalized text to the user. The terminal surface prints; a real
/// TTS engine would go behind this seam.
#[async_trait]
pub trait SpeechCapability: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), ResolverError>;
}

/// Stand-in when no geocode service is configured.
pub struct UnavailableLocation;

#[async_trait]
impl LocationCapability for UnavailableLocation {
    async fn detect_current_address(&self) -> Result<Address, ResolverError> {
        Err(ResolverError::NotAvailable)
    }
}

/// Stand-in when no weather service is configured; logs instead of calling.
pub struct LoggingWeather;

#[async_trait]
impl WeatherCapability for LoggingWeather {
    async fn refresh(&self, address: &Address) -> Result<(), ResolverError> {
        log::info!(
            "[WEATHER] refresh requested for '{}' (no service configured)",
            address.formatted()
        );
        Ok(())
    }
}
