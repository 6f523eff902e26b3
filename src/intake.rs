//! Per-chat registration dialogue: plate, full name, room, phone.
//!
//! Pure state handling; the bot turns `IntakeEvent`s into replies and
//! persists completed submissions.

use std::collections::HashMap;

use tracing::debug;

use crate::staging::PendingSubmission;

pub const ASK_PLATE: &str = "Enter the vehicle plate number (Latin characters):";
pub const ASK_FIO: &str = "Enter your full name:";
pub const ASK_ROOM: &str = "Enter your room number:";
pub const ASK_PHONE: &str = "Enter your phone number:";
pub const SUBMITTED: &str = "Request submitted!";
pub const CANCELLED: &str = "Vehicle registration cancelled.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    AwaitingPlate,
    AwaitingFio { plates: String },
    AwaitingRoom { plates: String, fio: String },
    AwaitingPhone { plates: String, fio: String, room: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    /// Send this text back to the chat.
    Reply(&'static str),
    /// All four answers collected; the conversation is over.
    Completed(PendingSubmission),
    /// Message outside the dialogue, or a command it does not accept.
    Ignored,
}

#[derive(Debug, Default)]
pub struct Intake {
    conversations: HashMap<i64, Step>,
}

impl Intake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self, chat_id: i64) -> bool {
        self.conversations.contains_key(&chat_id)
    }

    pub fn handle(&mut self, chat_id: i64, text: &str) -> IntakeEvent {
        if let Some(command) = command_name(text) {
            return self.handle_command(chat_id, command);
        }

        let Some(step) = self.conversations.remove(&chat_id) else {
            return IntakeEvent::Ignored;
        };

        let answer = text.to_string();
        let (next, event) = match step {
            Step::AwaitingPlate => (
                Some(Step::AwaitingFio { plates: answer }),
                IntakeEvent::Reply(ASK_FIO),
            ),
            Step::AwaitingFio { plates } => (
                Some(Step::AwaitingRoom { plates, fio: answer }),
                IntakeEvent::Reply(ASK_ROOM),
            ),
            Step::AwaitingRoom { plates, fio } => (
                Some(Step::AwaitingPhone {
                    plates,
                    fio,
                    room: answer,
                }),
                IntakeEvent::Reply(ASK_PHONE),
            ),
            Step::AwaitingPhone { plates, fio, room } => (
                None,
                IntakeEvent::Completed(PendingSubmission::new(plates, fio, room, answer)),
            ),
        };

        if let Some(next) = next {
            debug!("Chat {} advanced to {:?}", chat_id, next);
            self.conversations.insert(chat_id, next);
        }
        event
    }

    fn handle_command(&mut self, chat_id: i64, command: &str) -> IntakeEvent {
        match command {
            "/start" if !self.in_progress(chat_id) => {
                self.conversations.insert(chat_id, Step::AwaitingPlate);
                IntakeEvent::Reply(ASK_PLATE)
            }
            "/cancel" if self.conversations.remove(&chat_id).is_some() => {
                IntakeEvent::Reply(CANCELLED)
            }
            _ => IntakeEvent::Ignored,
        }
    }
}

/// `/start@SomeBot extra` -> `/start`.
fn command_name(text: &str) -> Option<&str> {
    let word = text.trim_start().split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    Some(word.split('@').next().unwrap_or(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: i64 = 42;

    #[test]
    fn test_full_dialogue() {
        let mut intake = Intake::new();
        assert_eq!(intake.handle(CHAT, "/start"), IntakeEvent::Reply(ASK_PLATE));
        assert_eq!(intake.handle(CHAT, "AB1234CD"), IntakeEvent::Reply(ASK_FIO));
        assert_eq!(intake.handle(CHAT, "Ivanov"), IntakeEvent::Reply(ASK_ROOM));
        assert_eq!(intake.handle(CHAT, "12"), IntakeEvent::Reply(ASK_PHONE));

        let IntakeEvent::Completed(submission) = intake.handle(CHAT, "555-0100") else {
            panic!("dialogue did not complete");
        };
        assert_eq!(submission.plates, "AB1234CD");
        assert_eq!(submission.fio, "Ivanov");
        assert_eq!(submission.room, "12");
        assert_eq!(submission.phone, "555-0100");
        assert!(!intake.in_progress(CHAT));
    }

    #[test]
    fn test_answers_are_taken_verbatim() {
        let mut intake = Intake::new();
        intake.handle(CHAT, "/start");
        intake.handle(CHAT, " not a plate! ");
        intake.handle(CHAT, "x");
        intake.handle(CHAT, "y");

        let IntakeEvent::Completed(submission) = intake.handle(CHAT, "z") else {
            panic!("dialogue did not complete");
        };
        assert_eq!(submission.plates, " not a plate! ");
    }

    #[test]
    fn test_cancel_discards_answers() {
        let mut intake = Intake::new();
        intake.handle(CHAT, "/start");
        intake.handle(CHAT, "AB1234CD");

        assert_eq!(intake.handle(CHAT, "/cancel"), IntakeEvent::Reply(CANCELLED));
        assert!(!intake.in_progress(CHAT));
        assert_eq!(intake.handle(CHAT, "Ivanov"), IntakeEvent::Ignored);

        // A fresh dialogue starts from the plate again
        assert_eq!(intake.handle(CHAT, "/start"), IntakeEvent::Reply(ASK_PLATE));
    }

    #[test]
    fn test_ignored_input() {
        let mut intake = Intake::new();
        assert_eq!(intake.handle(CHAT, "hello"), IntakeEvent::Ignored);
        assert_eq!(intake.handle(CHAT, "/cancel"), IntakeEvent::Ignored);

        intake.handle(CHAT, "/start");
        // Commands other than /cancel do not restart or advance the dialogue
        assert_eq!(intake.handle(CHAT, "/start"), IntakeEvent::Ignored);
        assert_eq!(intake.handle(CHAT, "/help"), IntakeEvent::Ignored);
        assert_eq!(intake.handle(CHAT, "AB1234CD"), IntakeEvent::Reply(ASK_FIO));
    }

    #[test]
    fn test_chats_are_independent() {
        let mut intake = Intake::new();
        intake.handle(1, "/start");
        intake.handle(2, "/start");
        intake.handle(1, "AB1234CD");

        assert_eq!(intake.handle(2, "XY9999ZZ"), IntakeEvent::Reply(ASK_FIO));
        assert_eq!(intake.handle(1, "Ivanov"), IntakeEvent::Reply(ASK_ROOM));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/start"), Some("/start"));
        assert_eq!(command_name("/cancel@PlateGateBot now"), Some("/cancel"));
        assert_eq!(command_name("AB/12"), None);
        assert_eq!(command_name("   "), None);
    }
}
