use indexer_config::IndexerConfig;
use uuid::Uuid;

/// Consumer group id for this process
///
/// With unique group ids enabled every process gets its own group (and sees
/// every message); otherwise all instances share the service-name group and
/// split the partitions between them. The suffix is drawn once, so build one
/// identity per process and keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupIdentity {
    prefix: String,
    suffix: Option<String>,
}

impl ConsumerGroupIdentity {
    pub fn new(prefix: impl Into<String>, unique: bool) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: unique.then(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(
            config.service_name.clone(),
            config.kafka.enable_unique_consumer_group_ids,
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn group_id(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}_{}", self.prefix, suffix),
            None => self.prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_group_id_is_service_name() {
        let identity = ConsumerGroupIdentity::new("indexer-service", false);
        assert_eq!(identity.group_id(), "indexer-service");
        assert_eq!(identity.suffix(), None);
    }

    #[test]
    fn test_unique_group_id_is_stable_per_identity() {
        let identity = ConsumerGroupIdentity::new("indexer-service", true);
        let group_id = identity.group_id();

        assert!(group_id.starts_with("indexer-service_"));
        assert_eq!(identity.group_id(), group_id);

        let other = ConsumerGroupIdentity::new("indexer-service", true);
        assert_ne!(other.group_id(), group_id);
    }
}
