use serde::{Deserialize, Serialize};

/// One generated customer. Ids start at 1 and increase by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
}
