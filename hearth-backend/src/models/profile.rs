use serde::{Deserialize, Serialize};

use super::Address;

/// House-level facts derived from committed answers. Persisted inside the
/// notes document; updated by side-effect tasks, never read on the save path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseProfile {
    #[serde(default)]
    pub house_name: Option<String>,
    #[serde(default)]
    pub confirmed_address: Option<Address>,
}
