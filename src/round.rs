//! Pure resolution of one coordinator round.
//!
//! Peers are addressed by position: `A` is the first peer of the match, `B`
//! the second. Nothing here touches a channel; the coordinator reads both
//! inputs, calls into this module and only then sends what it returns.

use crate::error::SessionError;
use crate::protocol::{Coord, EndClaim, Message, TurnAction};

/// Shots announced simultaneously in the previous round, already swapped
/// so that each peer gets the opponent's coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotBuffer {
    pub to_a: Coord,
    pub to_b: Coord,
}

/// What a peer is told at the end of a turn round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Shot(Coord),
    Ack,
}

impl From<Reply> for Message {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Shot(coord) => Message::Shot { coord },
            Reply::Ack => Message::Ack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResolution {
    pub to_a: Reply,
    pub to_b: Reply,
    /// Buffer carried into the next round.
    pub buffer: Option<ShotBuffer>,
}

/// Resolve one round of turn actions.
///
/// A buffer only survives a single round: it must be collected by both
/// peers expecting a shot right after the simultaneous announce.
pub fn resolve_round(
    a: TurnAction,
    b: TurnAction,
    buffer: Option<ShotBuffer>,
) -> Result<RoundResolution, SessionError> {
    use TurnAction::{AnnounceShot, ExpectShot};

    match (a, b, buffer) {
        (ExpectShot, ExpectShot, Some(buffered)) => Ok(RoundResolution {
            to_a: Reply::Shot(buffered.to_a),
            to_b: Reply::Shot(buffered.to_b),
            buffer: None,
        }),
        (ExpectShot, ExpectShot, None) => Err(SessionError::Deadlock(
            "both peers wait for a shot".to_string(),
        )),
        (_, _, Some(buffered)) => Err(SessionError::Game(format!(
            "simultaneous shots {} and {} were never collected",
            buffered.to_b, buffered.to_a
        ))),
        (AnnounceShot(shot), ExpectShot, None) => Ok(RoundResolution {
            to_a: Reply::Ack,
            to_b: Reply::Shot(shot),
            buffer: None,
        }),
        (ExpectShot, AnnounceShot(shot), None) => Ok(RoundResolution {
            to_a: Reply::Shot(shot),
            to_b: Reply::Ack,
            buffer: None,
        }),
        (AnnounceShot(from_a), AnnounceShot(from_b), None) => Ok(RoundResolution {
            to_a: Reply::Ack,
            to_b: Reply::Ack,
            buffer: Some(ShotBuffer {
                to_a: from_b,
                to_b: from_a,
            }),
        }),
    }
}

/// Decide the winner once at least one peer sent an [`EndClaim`].
///
/// Rules apply in order. A lone forfeit hands the win to the opponent
/// whatever the other claim says; a double forfeit has no winner. Then a
/// lone concession (naming the opponent) does the same, and a mutual one has
/// no winner. Otherwise both peers must name the same participant.
///
/// When both peers share an identifier a named winner cannot point at either
/// of them, so no claim counts as a concession.
pub fn arbitrate(identifiers: [&str; 2], claims: [Option<&EndClaim>; 2]) -> Option<String> {
    let forfeited = [0, 1].map(|me| claims[me].is_some_and(|claim| claim.forfeit));
    if let Some(winner) = lone_yield(forfeited)? {
        return Some(identifiers[winner].to_string());
    }

    let distinct = identifiers[0] != identifiers[1];
    let conceded = [0, 1].map(|me| {
        distinct && claims[me].is_some_and(|claim| claim.winner.as_deref() == Some(identifiers[1 - me]))
    });
    if let Some(winner) = lone_yield(conceded)? {
        return Some(identifiers[winner].to_string());
    }

    match claims {
        [Some(a), Some(b)] => match (&a.winner, &b.winner) {
            (Some(wa), Some(wb)) if wa == wb && identifiers.contains(&wa.as_str()) => {
                Some(wa.clone())
            }
            _ => None,
        },
        _ => None,
    }
}

/// `Some(Some(opponent))` when exactly one peer yielded, `None` when both
/// did (nobody wins), `Some(None)` when neither did.
fn lone_yield(yielded: [bool; 2]) -> Option<Option<usize>> {
    match yielded {
        [true, true] => None,
        [true, false] => Some(Some(1)),
        [false, true] => Some(Some(0)),
        [false, false] => Some(None),
    }
}
