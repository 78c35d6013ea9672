//! Messages exchanged between a client session and the match coordinator,
//! plus the game-level values they carry.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SessionError};

/// Version string sent in the handshake request. The server refuses peers
/// announcing anything else.
pub const PROTOCOL_VERSION: &str = "1.0";

/// A board cell, `(row, col)` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: u32,
    pub col: u32,
}

impl Coord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl From<(u32, u32)> for Coord {
    fn from((row, col): (u32, u32)) -> Self {
        Self { row, col }
    }
}

impl core::fmt::Display for Coord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One ship of a fleet: its length, the cell of its top/left end and its
/// orientation. Legality on a board is up to the players, not the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub size: u32,
    pub origin: Coord,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub fn new(size: u32, origin: impl Into<Coord>, orientation: Orientation) -> Self {
        Self {
            size,
            origin: origin.into(),
            orientation,
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.orientation == Orientation::Vertical
    }
}

/// What a peer wants to do in one round of the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnAction {
    AnnounceShot(Coord),
    ExpectShot,
}

/// A peer's view of how the game ended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndClaim {
    pub winner: Option<String>,
    pub forfeit: bool,
}

/// Structured failure carried by [`Message::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

/// Wire messages. `Error` is reserved: whoever receives it stops processing
/// the protocol and surfaces the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Client → server: who I am and which protocol I speak.
    Handshake { identifier: String, version: String },
    /// Server → client: who the opponent is and whether I shoot first.
    Welcome { identifier: String, first: bool },
    /// A whole fleet as parallel vectors, in both directions.
    Placement {
        sizes: Vec<u32>,
        coords: Vec<Coord>,
        vertical: Vec<bool>,
    },
    AnnounceShot { coord: Coord },
    ExpectShot,
    /// Server → client: the opponent's shot.
    Shot { coord: Coord },
    /// Server → client: empty acknowledgement.
    Ack,
    EndClaim { winner: Option<String>, forfeit: bool },
    /// Server → both clients: the arbitrated winner, if any.
    Outcome { winner: Option<String> },
    Error(ErrorPayload),
}

impl Message {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "Handshake",
            Message::Welcome { .. } => "Welcome",
            Message::Placement { .. } => "Placement",
            Message::AnnounceShot { .. } => "AnnounceShot",
            Message::ExpectShot => "ExpectShot",
            Message::Shot { .. } => "Shot",
            Message::Ack => "Ack",
            Message::EndClaim { .. } => "EndClaim",
            Message::Outcome { .. } => "Outcome",
            Message::Error(_) => "Error",
        }
    }

    pub fn from_fleet(fleet: &[ShipPlacement]) -> Self {
        Message::Placement {
            sizes: fleet.iter().map(|ship| ship.size).collect(),
            coords: fleet.iter().map(|ship| ship.origin).collect(),
            vertical: fleet.iter().map(ShipPlacement::is_vertical).collect(),
        }
    }
}

impl From<TurnAction> for Message {
    fn from(action: TurnAction) -> Self {
        match action {
            TurnAction::AnnounceShot(coord) => Message::AnnounceShot { coord },
            TurnAction::ExpectShot => Message::ExpectShot,
        }
    }
}

impl From<EndClaim> for Message {
    fn from(claim: EndClaim) -> Self {
        Message::EndClaim {
            winner: claim.winner,
            forfeit: claim.forfeit,
        }
    }
}

/// Check that a placement message is made of parallel vectors.
pub fn check_placement_shape(
    sizes: &[u32],
    coords: &[Coord],
    vertical: &[bool],
) -> Result<(), SessionError> {
    if sizes.len() != coords.len() || sizes.len() != vertical.len() {
        return Err(SessionError::Protocol(format!(
            "placement vectors differ in length: {} sizes, {} coords, {} orientations",
            sizes.len(),
            coords.len(),
            vertical.len()
        )));
    }
    Ok(())
}

/// Rebuild a fleet from the parallel vectors of a placement message.
pub fn fleet_from_parts(
    sizes: Vec<u32>,
    coords: Vec<Coord>,
    vertical: Vec<bool>,
) -> Result<Vec<ShipPlacement>, SessionError> {
    check_placement_shape(&sizes, &coords, &vertical)?;
    sizes
        .into_iter()
        .zip(coords)
        .zip(vertical)
        .map(|((size, origin), vertical)| {
            if size == 0 {
                return Err(SessionError::Protocol(format!(
                    "ship at {origin} has size 0"
                )));
            }
            let orientation = if vertical {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            };
            Ok(ShipPlacement {
                size,
                origin,
                orientation,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_survives_placement_message() {
        let fleet = vec![
            ShipPlacement::new(3, (0, 2), Orientation::Vertical),
            ShipPlacement::new(1, (1, 0), Orientation::Horizontal),
        ];
        let Message::Placement {
            sizes,
            coords,
            vertical,
        } = Message::from_fleet(&fleet)
        else {
            panic!("expected Placement");
        };
        assert_eq!(vertical, vec![true, false]);
        assert_eq!(fleet_from_parts(sizes, coords, vertical).unwrap(), fleet);
    }

    #[test]
    fn ragged_placement_is_a_protocol_error() {
        let err = fleet_from_parts(vec![3, 1], vec![Coord::new(0, 0)], vec![true, false])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn zero_sized_ship_is_rejected() {
        let err = fleet_from_parts(vec![0], vec![Coord::new(0, 0)], vec![false]).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[test]
    fn message_survives_bincode() {
        let msg = Message::EndClaim {
            winner: Some("Quokka".into()),
            forfeit: false,
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let back: Message = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}
