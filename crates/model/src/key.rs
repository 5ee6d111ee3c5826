use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifies one source-table -> target-table pairing. Used as the primary
/// key in the checkpoint and progress tables so several distinct migrations
/// can share the same target metadata tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationKey(Arc<str>);

impl MigrationKey {
    pub fn new(source_dsn: &str, source_db: &str, source_table: &str) -> Self {
        Self(Arc::from(format!("{source_dsn}.{source_db}.{source_table}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MigrationKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_dotted_key() {
        let key = MigrationKey::new("mysql://src:3306", "shop", "orders");
        assert_eq!(key.as_str(), "mysql://src:3306.shop.orders");
    }
}
