//! Fully-qualified topic decomposition.
//!
//! A fully-qualified topic name (FQTN) has the form `"@/<partition>@<topic>"`:
//! the partition always begins with `/`; the topic never contains the `@`
//! delimiter.

/// Split a fully-qualified topic into `(partition, topic)`.
///
/// Returns `None` if `fqtn` does not contain the `@` delimiter expected by
/// the wire format, or if the partition segment does not start with `/`.
pub fn decompose_fully_qualified_topic(fqtn: &str) -> Option<(&str, &str)> {
    let fqtn = fqtn.strip_prefix('@').unwrap_or(fqtn);
    let (partition, topic) = fqtn.split_once('@')?;
    if !partition.starts_with('/') {
        return None;
    }
    Some((partition, topic))
}

/// Join a partition and bare topic back into a fully-qualified topic name.
pub fn compose_fully_qualified_topic(partition: &str, topic: &str) -> String {
    format!("@{partition}@{topic}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_partition_and_topic() {
        let (partition, topic) = decompose_fully_qualified_topic("@/robot@cmd").unwrap();
        assert_eq!(partition, "/robot");
        assert_eq!(topic, "cmd");
    }

    #[test]
    fn round_trips_through_compose() {
        let fqtn = compose_fully_qualified_topic("/robot", "cmd");
        assert_eq!(fqtn, "@/robot@cmd");
        let (partition, topic) = decompose_fully_qualified_topic(&fqtn).unwrap();
        assert_eq!(partition, "/robot");
        assert_eq!(topic, "cmd");
    }

    #[test]
    fn topic_may_be_empty() {
        let (partition, topic) = decompose_fully_qualified_topic("@/robot@").unwrap();
        assert_eq!(partition, "/robot");
        assert_eq!(topic, "");
    }

    #[test]
    fn rejects_missing_delimiter() {
        assert!(decompose_fully_qualified_topic("robot-cmd").is_none());
    }

    #[test]
    fn rejects_partition_without_leading_slash() {
        assert!(decompose_fully_qualified_topic("@robot@cmd").is_none());
    }
}
