//! Node keys.
//!
//! ```text
//! root
//! ├── user_preferences
//! ├── channel:<channel>
//! ├── topic:<topic id>
//! └── entity_type:<type>
//!     └── entity:<entity id>
//! ```

use strata_core::{EntityType, NodeType};

/// Key of the single root node.
pub const ROOT_KEY: &str = "root";

/// Key of the permanent preferences node.
pub const PREFERENCES_KEY: &str = "user_preferences";

/// `channel:<channel>`.
pub fn channel_key(channel: &str) -> String {
    format!("channel:{channel}")
}

/// `entity_type:<type>`.
pub fn entity_type_key(entity_type: EntityType) -> String {
    format!("entity_type:{entity_type}")
}

/// `entity:<id>`.
pub fn entity_key(entity_id: &str) -> String {
    format!("entity:{entity_id}")
}

/// `topic:<id>`.
pub fn topic_key(topic_id: &str) -> String {
    format!("topic:{topic_id}")
}

/// Split a key into its node type and scope id (empty for root and
/// preferences).
pub fn parse_key(key: &str) -> Option<(NodeType, &str)> {
    match key {
        ROOT_KEY => return Some((NodeType::Root, "")),
        PREFERENCES_KEY => return Some((NodeType::Preferences, "")),
        _ => {}
    }
    let (prefix, id) = key.split_once(':')?;
    if id.is_empty() {
        return None;
    }
    let node_type = match prefix {
        "channel" => NodeType::Channel,
        "entity_type" => NodeType::EntityType,
        "entity" => NodeType::Entity,
        "topic" => NodeType::Topic,
        _ => return None,
    };
    Some((node_type, id))
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_back() {
        assert_eq!(parse_key(ROOT_KEY), Some((NodeType::Root, "")));
        assert_eq!(parse_key(PREFERENCES_KEY), Some((NodeType::Preferences, "")));
        assert_eq!(parse_key(&channel_key("telegram")), Some((NodeType::Channel, "telegram")));
        assert_eq!(
            parse_key(&entity_type_key(EntityType::Person)),
            Some((NodeType::EntityType, "person"))
        );
        assert_eq!(parse_key(&entity_key("ent_1")), Some((NodeType::Entity, "ent_1")));
        assert_eq!(parse_key(&topic_key("top_1")), Some((NodeType::Topic, "top_1")));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert_eq!(parse_key("bogus"), None);
        assert_eq!(parse_key("entity:"), None);
        assert_eq!(parse_key("node:x"), None);
    }
}
