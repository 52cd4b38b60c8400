#![forbid(unsafe_code)]

const ENV_FLUSH_EVERY_ROWS: &str = "PPOD_FLUSH_EVERY_ROWS";
const ENV_UNKNOWN_IDS: &str = "PPOD_UNKNOWN_IDS";

/// What to do when an incoming entity carries an external id that has no
/// persisted counterpart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownIdPolicy {
    /// Create a fresh entity with a newly generated id.
    #[default]
    Create,
    /// Fail the whole call with `ReconcileError::NotFound`.
    Reject,
}

impl UnknownIdPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Reject => "reject",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Rows (or sequences) processed between two `Dao::flush` calls.
    pub flush_every_rows: usize,
    pub unknown_ids: UnknownIdPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            flush_every_rows: 1,
            unknown_ids: UnknownIdPolicy::Create,
        }
    }
}

impl ReconcileConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_FLUSH_EVERY_ROWS) {
            match raw.trim().parse::<usize>() {
                Ok(rows) if rows > 0 => config.flush_every_rows = rows,
                _ => tracing::warn!("invalid {ENV_FLUSH_EVERY_ROWS}, ignoring: {raw:?}"),
            }
        }
        if let Some(raw) = lookup(ENV_UNKNOWN_IDS) {
            match UnknownIdPolicy::parse(&raw) {
                Some(policy) => config.unknown_ids = policy,
                None => tracing::warn!("invalid {ENV_UNKNOWN_IDS}, ignoring: {raw:?}"),
            }
        }
        config
    }

    pub fn with_flush_every_rows(mut self, rows: usize) -> Self {
        self.flush_every_rows = rows.max(1);
        self
    }

    pub fn with_unknown_ids(mut self, policy: UnknownIdPolicy) -> Self {
        self.unknown_ids = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let config = ReconcileConfig::from_lookup(|key| match key {
            "PPOD_FLUSH_EVERY_ROWS" => Some("25".to_string()),
            "PPOD_UNKNOWN_IDS" => Some(" Reject ".to_string()),
            _ => None,
        });
        assert_eq!(config.flush_every_rows, 25);
        assert_eq!(config.unknown_ids, UnknownIdPolicy::Reject);
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let config = ReconcileConfig::from_lookup(|key| match key {
            "PPOD_FLUSH_EVERY_ROWS" => Some("0".to_string()),
            "PPOD_UNKNOWN_IDS" => Some("sometimes".to_string()),
            _ => None,
        });
        assert_eq!(config, ReconcileConfig::default());
    }

    #[test]
    fn policy_names_parse_back() {
        for policy in [UnknownIdPolicy::Create, UnknownIdPolicy::Reject] {
            assert_eq!(UnknownIdPolicy::parse(policy.as_str()), Some(policy));
        }
        assert_eq!(UnknownIdPolicy::parse("CREATE\n"), Some(UnknownIdPolicy::Create));
        assert_eq!(UnknownIdPolicy::parse(""), None);
    }
}
