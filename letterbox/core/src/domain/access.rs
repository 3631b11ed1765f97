// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Access predicates shared by the application services.
//!
//! These are pure functions over already-loaded entities; they never touch
//! storage.

use crate::domain::connection::Connection;
use crate::domain::letter::Letter;
use crate::domain::user::UserId;

pub fn is_participant(letter: &Letter, user: UserId) -> bool {
    letter.sender == user || letter.receiver == user
}

/// Only the original sender may approve or reject proposed edits.
pub fn is_approval_authority(letter: &Letter, user: UserId) -> bool {
    letter.sender == user
}

pub fn is_connection_party(connection: &Connection, user: UserId) -> bool {
    connection.requester == user || connection.receiver == user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::letter::LetterHistory;

    #[test]
    fn test_letter_predicates() {
        let sender = UserId::new();
        let receiver = UserId::new();
        let outsider = UserId::new();
        let letter = LetterHistory::compose(sender, receiver, "hi").letter;

        assert!(is_participant(&letter, sender));
        assert!(is_participant(&letter, receiver));
        assert!(!is_participant(&letter, outsider));

        assert!(is_approval_authority(&letter, sender));
        assert!(!is_approval_authority(&letter, receiver));
    }

    #[test]
    fn test_connection_party() {
        let a = UserId::new();
        let b = UserId::new();
        let conn = Connection::new(a, b);
        assert!(is_connection_party(&conn, a));
        assert!(is_connection_party(&conn, b));
        assert!(!is_connection_party(&conn, UserId::new()));
    }
}
