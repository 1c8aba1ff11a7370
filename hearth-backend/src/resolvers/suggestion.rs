//! Turns ambient context into pre-populated candidate answers.

use std::sync::Arc;

use super::LocationCapability;
use crate::errors::ResolverError;
use crate::models::{Address, HouseProfile};

pub struct SuggestionResolver {
    location: Arc<dyn LocationCapability>,
}

impl SuggestionResolver {
    pub fn new(location: Arc<dyn LocationCapability>) -> Self {
        SuggestionResolver { location }
    }

    /// Suggested answer for the address-confirmation question: the detected
    /// address as a single editable line.
    pub async fn address_suggestion(&self) -> Result<String, ResolverError> {
        let address = self.location.detect_current_address().await?;
        let formatted = address.formatted();
        if formatted.is_empty() {
            return Err(ResolverError::NotAvailable);
        }
        Ok(formatted)
    }

    /// Suggested answer for the house-naming question, derived from the
    /// confirmed address when one exists, else from a fresh detection.
    pub async fn house_name_suggestion(
        &self,
        profile: &HouseProfile,
    ) -> Result<String, ResolverError> {
        let address = match &profile.confirmed_address {
            Some(address) => address.clone(),
            None => self.location.detect_current_address().await?,
        };
        derive_house_name(&address).ok_or(ResolverError::NotAvailable)
    }
}

/// Deterministic house-name candidate: street name with the house number
/// stripped ("742 Evergreen Terrace" -> "The Evergreen Terrace House"),
/// falling back to the city.
pub fn derive_house_name(address: &Address) -> Option<String> {
    let source = address.street.as_deref().or(address.city.as_deref())?;
    let words: Vec<&str> = source
        .split_whitespace()
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(format!("The {} House", words.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub struct FixedLocation {
        pub address: Address,
        pub calls: AtomicU32,
    }

    #[async_trait]
    impl LocationCapability for FixedLocation {
        async fn detect_current_address(&self) -> Result<Address, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.address.clone())
        }
    }

    #[test]
    fn test_derive_house_name_strips_house_number() {
        let address = Address::parse("742 Evergreen Terrace, Springfield");
        assert_eq!(
            derive_house_name(&address).as_deref(),
            Some("The Evergreen Terrace House")
        );
    }

    #[test]
    fn test_derive_house_name_falls_back_to_city() {
        let address = Address {
            street: None,
            city: Some("Springfield".to_string()),
            region: None,
        };
        assert_eq!(
            derive_house_name(&address).as_deref(),
            Some("The Springfield House")
        );
    }

    #[test]
    fn test_derive_house_name_empty_address() {
        assert_eq!(derive_house_name(&Address::default()), None);
        // a street that is only a house number has nothing to name after
        let address = Address {
            street: Some("1234".to_string()),
            city: None,
            region: None,
        };
        assert_eq!(derive_house_name(&address), None);
    }

    #[tokio::test]
    async fn test_house_name_suggestion_prefers_confirmed_address() {
        let location = Arc::new(FixedLocation {
            address: Address::parse("9 Detected Road"),
            calls: AtomicU32::new(0),
        });
        let resolver = SuggestionResolver::new(location.clone());

        let profile = HouseProfile {
            house_name: None,
            confirmed_address: Some(Address::parse("742 Evergreen Terrace")),
        };
        let suggestion = resolver.house_name_suggestion(&profile).await.unwrap();

        assert_eq!(suggestion, "The Evergreen Terrace House");
        // the confirmed address short-circuits detection
        assert_eq!(location.calls.load(Ordering::SeqCst), 0);
    }
}
