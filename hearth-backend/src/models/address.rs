use serde::{Deserialize, Serialize};

/// A human-readable postal address, as detected by the location capability
/// or parsed back out of a confirmed answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Address {
    /// Parse a comma-separated address string ("street, city, region").
    /// Missing trailing components are left unset; blank components are skipped.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw
            .split(',')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string());

        Address {
            street: parts.next(),
            city: parts.next(),
            region: parts.next(),
        }
    }

    /// Single display line, components joined by ", "
    pub fn formatted(&self) -> String {
        [&self.street, &self.city, &self.region]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<&str>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.region.is_none()
    }
}
