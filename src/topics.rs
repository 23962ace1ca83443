use crate::model::EventKind;

pub const TOPIC_PIR: &str = "accesshub/pir";
pub const TOPIC_ACCESS: &str = "accesshub/access";
/// 枢纽自身状态的公告主题（上线通告等）。
pub const TOPIC_STATUS: &str = "accesshub/status";

/// 按消息类别选择发布主题。
pub fn topic_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Pir => TOPIC_PIR,
        EventKind::Access => TOPIC_ACCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_selection_by_kind() {
        assert_eq!(topic_for(EventKind::Pir), "accesshub/pir");
        assert_eq!(topic_for(EventKind::Access), "accesshub/access");
    }
}
