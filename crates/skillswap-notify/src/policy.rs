use chrono::{DateTime, Utc};
use uuid::Uuid;

use skillswap_types::events::{Notification, NotificationPayload};

/// Message previews in notifications are cut at this many characters.
const PREVIEW_LEN: usize = 50;

/// A domain occurrence that may fan out into notifications. Display names
/// are resolved by the caller so the policy itself never touches the store.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    ConnectionRequested {
        connection_id: Uuid,
        from_user_id: Uuid,
        from_display_name: String,
        to_user_id: Uuid,
    },
    ConnectionAccepted {
        connection_id: Uuid,
        initiator_id: Uuid,
        accepter_id: Uuid,
        accepter_display_name: String,
    },
    ChatMessageSent {
        chat_id: Uuid,
        sender_id: Uuid,
        sender_display_name: String,
        participants: Vec<Uuid>,
        text: String,
    },
    EventCreated {
        event_id: Uuid,
        title: String,
        created_by: Uuid,
        creator_display_name: String,
        community_members: Vec<Uuid>,
    },
    EventReminder {
        event_id: Uuid,
        title: String,
        participants: Vec<Uuid>,
    },
    /// Membership grew; only the set difference of before/after is notified.
    CommunityMembersAdded {
        community_id: Uuid,
        name: String,
        inviter_display_name: String,
        members_before: Vec<Uuid>,
        members_after: Vec<Uuid>,
    },
    /// Self-directed: the requesting user is told about their own match.
    MatchFound {
        user_id: Uuid,
        matched_user_id: Uuid,
        matched_display_name: String,
        score: u8,
    },
}

/// Recipient selection and payload shaping for every event type.
/// Pure: same event in, same notifications out (modulo fresh row ids).
pub fn fan_out(event: &DomainEvent, now: DateTime<Utc>) -> Vec<Notification> {
    match event {
        DomainEvent::ConnectionRequested {
            connection_id,
            from_user_id,
            from_display_name,
            to_user_id,
        } => vec![notification(
            *to_user_id,
            "New Connection Request",
            format!("{from_display_name} wants to connect with you"),
            NotificationPayload::ConnectionRequest {
                from_user_id: *from_user_id,
                connection_id: *connection_id,
            },
            now,
        )],

        DomainEvent::ConnectionAccepted {
            connection_id,
            initiator_id,
            accepter_id,
            accepter_display_name,
        } => vec![notification(
            *initiator_id,
            "Connection Accepted",
            format!("{accepter_display_name} accepted your connection request"),
            NotificationPayload::ConnectionAccepted {
                user_id: *accepter_id,
                connection_id: *connection_id,
            },
            now,
        )],

        DomainEvent::ChatMessageSent {
            chat_id,
            sender_id,
            sender_display_name,
            participants,
            text,
        } => participants
            .iter()
            .filter(|id| *id != sender_id)
            .map(|recipient| {
                notification(
                    *recipient,
                    sender_display_name,
                    preview(text),
                    NotificationPayload::NewMessage {
                        chat_id: *chat_id,
                        sender_id: *sender_id,
                    },
                    now,
                )
            })
            .collect(),

        DomainEvent::EventCreated {
            event_id,
            title,
            created_by,
            creator_display_name,
            community_members,
        } => community_members
            .iter()
            .filter(|id| *id != created_by)
            .map(|recipient| {
                notification(
                    *recipient,
                    "New Event",
                    format!("{creator_display_name} created \"{title}\""),
                    NotificationPayload::NewEvent {
                        event_id: *event_id,
                        created_by: *created_by,
                    },
                    now,
                )
            })
            .collect(),

        DomainEvent::EventReminder {
            event_id,
            title,
            participants,
        } => participants
            .iter()
            .map(|recipient| {
                notification(
                    *recipient,
                    "Event Starting Soon",
                    format!("\"{title}\" starts in less than 1 hour"),
                    NotificationPayload::EventReminder { event_id: *event_id },
                    now,
                )
            })
            .collect(),

        DomainEvent::CommunityMembersAdded {
            community_id,
            name,
            inviter_display_name,
            members_before,
            members_after,
        } => members_after
            .iter()
            .filter(|id| !members_before.contains(*id))
            .map(|recipient| {
                notification(
                    *recipient,
                    "Community Invitation",
                    format!("{inviter_display_name} added you to \"{name}\""),
                    NotificationPayload::CommunityInvite {
                        community_id: *community_id,
                    },
                    now,
                )
            })
            .collect(),

        DomainEvent::MatchFound {
            user_id,
            matched_user_id,
            matched_display_name,
            score,
        } => vec![notification(
            *user_id,
            "New Match Found!",
            format!("You have a {score}% match with {matched_display_name}"),
            NotificationPayload::NewMatch {
                matched_user_id: *matched_user_id,
                score: *score,
            },
            now,
        )],
    }
}

fn notification(
    recipient_id: Uuid,
    title: impl Into<String>,
    body: String,
    payload: NotificationPayload,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        recipient_id,
        title: title.into(),
        body,
        payload,
        read: false,
        read_at: None,
        created_at: now,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_LEN {
        let cut: String = text.chars().take(PREVIEW_LEN).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_types::events::NotificationKind;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn connection_request_targets_the_receiving_side() {
        let out = fan_out(
            &DomainEvent::ConnectionRequested {
                connection_id: uid(100),
                from_user_id: uid(1),
                from_display_name: "Alice".into(),
                to_user_id: uid(2),
            },
            Utc::now(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient_id, uid(2));
        assert_eq!(out[0].kind(), NotificationKind::ConnectionRequest);
        assert_eq!(out[0].body, "Alice wants to connect with you");
    }

    #[test]
    fn acceptance_notifies_the_original_initiator() {
        let out = fan_out(
            &DomainEvent::ConnectionAccepted {
                connection_id: uid(100),
                initiator_id: uid(1),
                accepter_id: uid(2),
                accepter_display_name: "Bob".into(),
            },
            Utc::now(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient_id, uid(1));
        assert!(matches!(
            out[0].payload,
            NotificationPayload::ConnectionAccepted { user_id, .. } if user_id == uid(2)
        ));
    }

    #[test]
    fn chat_fan_out_excludes_the_sender() {
        let out = fan_out(
            &DomainEvent::ChatMessageSent {
                chat_id: uid(100),
                sender_id: uid(1),
                sender_display_name: "Alice".into(),
                participants: vec![uid(1), uid(2)],
                text: "hello".into(),
            },
            Utc::now(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient_id, uid(2));
        assert_eq!(out[0].title, "Alice");
        assert_eq!(out[0].body, "hello");
    }

    #[test]
    fn long_messages_are_truncated_in_the_preview() {
        let text = "x".repeat(80);
        let out = fan_out(
            &DomainEvent::ChatMessageSent {
                chat_id: uid(100),
                sender_id: uid(1),
                sender_display_name: "Alice".into(),
                participants: vec![uid(1), uid(2)],
                text,
            },
            Utc::now(),
        );

        assert_eq!(out[0].body, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn event_creation_skips_the_creator() {
        let out = fan_out(
            &DomainEvent::EventCreated {
                event_id: uid(100),
                title: "Rust study group".into(),
                created_by: uid(1),
                creator_display_name: "Alice".into(),
                community_members: vec![uid(1), uid(2), uid(3)],
            },
            Utc::now(),
        );

        let recipients: Vec<Uuid> = out.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![uid(2), uid(3)]);
        assert_eq!(out[0].body, "Alice created \"Rust study group\"");
    }

    #[test]
    fn reminders_go_to_every_participant() {
        let out = fan_out(
            &DomainEvent::EventReminder {
                event_id: uid(100),
                title: "Rust study group".into(),
                participants: vec![uid(1), uid(2)],
            },
            Utc::now(),
        );

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|n| n.kind() == NotificationKind::EventReminder));
    }

    #[test]
    fn only_newly_added_members_are_invited() {
        let out = fan_out(
            &DomainEvent::CommunityMembersAdded {
                community_id: uid(100),
                name: "Math Circle".into(),
                inviter_display_name: "Alice".into(),
                members_before: vec![uid(1)],
                members_after: vec![uid(1), uid(2), uid(3)],
            },
            Utc::now(),
        );

        let recipients: Vec<Uuid> = out.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![uid(2), uid(3)]);
    }

    #[test]
    fn match_notification_is_self_directed() {
        let out = fan_out(
            &DomainEvent::MatchFound {
                user_id: uid(1),
                matched_user_id: uid(2),
                matched_display_name: "Bob".into(),
                score: 75,
            },
            Utc::now(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient_id, uid(1));
        assert_eq!(out[0].body, "You have a 75% match with Bob");
        assert!(matches!(
            out[0].payload,
            NotificationPayload::NewMatch { score: 75, .. }
        ));
    }
}
