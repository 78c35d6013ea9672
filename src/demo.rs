//! A random player on a 3x3 board with two ships, and a driver running whole
//! games in-process.
//!
//! Each round the player announces one shot and then expects one, so both
//! players fire simultaneously and the coordinator cross-delivers the shots.
//! After each round both boards are checked and the game is ended naming the
//! winner, or nobody if both fleets sank together.

use rand::rngs::SmallRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::MatchConfig;
use crate::coordinator::MatchOutcome;
use crate::matchmaker::Matchmaker;
use crate::protocol::{Coord, Orientation, ShipPlacement};
use crate::server::Server;
use crate::session::{Exchange, GameSession};
use crate::transport::in_memory::InMemoryTransport;
use crate::transport::Transport;

pub const BOARD_SIZE: u32 = 3;

/// Single-character names used by [`simulate`].
const PLAYERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789@$%&?";

/// Randomly place a ship of size 3 and one of size 1 on the board.
pub fn create_positions(rng: &mut SmallRng) -> [ShipPlacement; 2] {
    let vertical = rng.random_bool(0.5);
    let offset3 = rng.random_range(0..2u32) * 2;
    let offset1 = rng.random_range(0..BOARD_SIZE);
    let orientation = if vertical {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    };
    let (long, short) = if vertical {
        ((0, offset3), (offset1, 2 - offset3))
    } else {
        ((offset3, 0), (2 - offset3, offset1))
    };
    [
        ShipPlacement::new(3, long, orientation),
        ShipPlacement::new(1, short, orientation),
    ]
}

/// Ship cells still afloat on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[Option<u32>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Grid {
    /// Expand a fleet onto a board; the server does not check fleets, so a
    /// ship sticking out of the board is refused here.
    pub fn from_fleet(fleet: &[ShipPlacement]) -> anyhow::Result<Self> {
        let mut cells = [[None; BOARD_SIZE as usize]; BOARD_SIZE as usize];
        for ship in fleet {
            for offset in 0..ship.size {
                let (row, col) = match ship.orientation {
                    Orientation::Vertical => (ship.origin.row + offset, ship.origin.col),
                    Orientation::Horizontal => (ship.origin.row, ship.origin.col + offset),
                };
                if row >= BOARD_SIZE || col >= BOARD_SIZE {
                    return Err(anyhow::anyhow!(
                        "ship of size {} at {} leaves the board",
                        ship.size,
                        ship.origin
                    ));
                }
                cells[row as usize][col as usize] = Some(ship.size);
            }
        }
        Ok(Self { cells })
    }

    pub fn hit(&mut self, coord: Coord) {
        if let Some(cell) = self
            .cells
            .get_mut(coord.row as usize)
            .and_then(|row| row.get_mut(coord.col as usize))
        {
            *cell = None;
        }
    }

    /// True once every ship cell was hit.
    pub fn defeated(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_none)
    }
}

/// Every cell of the board, row by row.
pub fn all_shots() -> Vec<Coord> {
    (0..BOARD_SIZE)
        .flat_map(|row| (0..BOARD_SIZE).map(move |col| Coord::new(row, col)))
        .collect()
}

/// Play one game on an open session; returns the winner the server settled on.
pub async fn play<T: Transport>(
    session: &mut GameSession<T>,
    rng: &mut SmallRng,
) -> anyhow::Result<Option<String>> {
    let me = session.name().to_string();
    let enemy = session.opponent().to_string();
    log::info!("{} vs {}", me, enemy);

    let my_fleet = create_positions(rng);
    let enemy_fleet = match session.place_ships(&my_fleet).await? {
        Exchange::Continue(fleet) => fleet,
        Exchange::Ended(winner) => return Ok(winner),
    };
    let mut my_board = Grid::from_fleet(&my_fleet)?;
    let mut enemy_board = Grid::from_fleet(&enemy_fleet)?;

    let mut shots = all_shots();
    shots.shuffle(rng);
    for my_shot in shots {
        if let Exchange::Ended(winner) = session.announce_shot(my_shot).await? {
            return Ok(winner);
        }
        let enemy_shot = match session.expect_shot().await? {
            Exchange::Continue(coord) => coord,
            Exchange::Ended(winner) => return Ok(winner),
        };
        enemy_board.hit(my_shot);
        my_board.hit(enemy_shot);

        let claim = match (my_board.defeated(), enemy_board.defeated()) {
            (false, false) => continue,
            (true, true) => None,
            (true, false) => Some(enemy.as_str()),
            (false, true) => Some(me.as_str()),
        };
        let winner = session.end_game(claim, false).await?;
        log::info!("{} vs {} => {:?}", me, enemy, winner);
        return Ok(winner);
    }
    Err(anyhow::anyhow!("placing all shots should have ended the game"))
}

/// Result of one simulated game.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    pub players: [String; 2],
    /// Winner as seen by each player, in the order of `players`.
    pub seen_winners: [Option<String>; 2],
    pub outcome: MatchOutcome,
}

/// Run `games` complete games between random players through one server.
pub async fn simulate(games: usize, seed: u64) -> anyhow::Result<Vec<GameReport>> {
    let server: Server<InMemoryTransport> =
        Server::with_matchmaker(Matchmaker::with_seed(MatchConfig::default(), seed));
    let mut rng = SmallRng::seed_from_u64(seed);
    let names: Vec<char> = PLAYERS.chars().collect();

    let mut reports = Vec::with_capacity(games);
    for _ in 0..games {
        let players: Vec<String> = names
            .choose_multiple(&mut rng, 2)
            .map(|c| c.to_string())
            .collect();

        let mut servers = Vec::new();
        let mut clients = Vec::new();
        for name in &players {
            let (server_end, client_end) = InMemoryTransport::pair();
            let server = server.clone();
            servers.push(tokio::spawn(async move {
                server.handle_connection(server_end).await
            }));

            let name = name.clone();
            let mut player_rng = SmallRng::seed_from_u64(rng.random());
            clients.push(tokio::spawn(async move {
                let mut session = GameSession::start(Some(&name), client_end).await?;
                play(&mut session, &mut player_rng).await
            }));
        }

        let mut seen_winners = Vec::with_capacity(2);
        for client in clients {
            seen_winners.push(client.await??);
        }
        let mut outcome = None;
        for served in servers {
            outcome = Some(served.await??);
        }
        let outcome = outcome.ok_or_else(|| anyhow::anyhow!("no server task ran"))?;

        reports.push(GameReport {
            players: [players[0].clone(), players[1].clone()],
            seen_winners: [seen_winners[0].clone(), seen_winners[1].clone()],
            outcome,
        });
    }
    Ok(reports)
}
