use rand::RngCore;

use super::grid::{self, Card, Direction, Grid, Score};

/// Round is one snapshot in a board's history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Round {
    pub(crate) grid: Grid,
    pub(crate) score: Score,
}

/// Board represents a locally played 2048 game that keeps track of the history of its grids.
pub(crate) struct Board {
    rng: Box<dyn RngCore + Send>,
    rounds: Vec<Round>,
}

impl Board {
    /// Initialize new board using the given random number generator, starting from two
    /// spawned tiles.
    pub(crate) fn new(mut rng: impl RngCore + Send + 'static) -> Self {
        let start = grid::spawn_random_tile(&Grid::EMPTY, &mut rng);
        let start = grid::spawn_random_tile(&start, &mut rng);
        let mut rounds = Vec::with_capacity(2000);
        rounds.push(Round {
            grid: start,
            score: 0,
        });
        Self {
            rng: Box::new(rng),
            rounds,
        }
    }

    pub(crate) fn score(&self) -> Score {
        self.current().score
    }

    pub(crate) fn current(&self) -> Round {
        *self
            .rounds
            .last()
            .expect("a board must always have at least one round")
    }

    pub(crate) fn grid(&self) -> Grid {
        self.current().grid
    }

    pub(crate) fn max_tile(&self) -> Card {
        self.grid().max_tile()
    }

    /// shift attempts to shift the board in the given direction and returns the new round
    /// if anything changed. A tile is spawned only after a move that changed the grid.
    pub(crate) fn shift(&mut self, direction: Direction) -> Option<Round> {
        let prev = self.current();
        let res = grid::shift(&prev.grid, direction);
        if !res.changed {
            return None;
        }
        let round = Round {
            grid: grid::spawn_random_tile(&res.grid, &mut self.rng),
            score: prev.score + res.score_delta,
        };
        self.rounds.push(round);
        Some(round)
    }

    pub(crate) fn is_game_over(&self) -> bool {
        grid::is_terminal(&self.grid())
    }

    pub(crate) fn moves(&self) -> usize {
        self.rounds.len() - 1
    }

    #[cfg(test)]
    pub(crate) fn set_initial_round(&mut self, round: Round) {
        let mut v = Vec::with_capacity(1);
        v.push(round);
        self.rounds = v;
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::engine::grid::empty_cells;

    fn board() -> Board {
        Board::new(SmallRng::seed_from_u64(7))
    }

    #[test]
    fn starts_with_two_tiles() {
        let b = board();
        assert_eq!(empty_cells(&b.grid()).len(), 14);
        assert_eq!(b.score(), 0);
        assert_eq!(b.moves(), 0);
    }

    #[test]
    fn changed_shift_spawns_and_scores() {
        let mut b = board();
        b.set_initial_round(Round {
            grid: Grid::from([[2, 2, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]),
            score: 10,
        });
        let round = b.shift(Direction::Left).expect("merging move should change the grid");
        assert_eq!(round.score, 14);
        assert_eq!(round.grid.get(&grid::Idx(0, 0)), 4);
        assert_eq!(empty_cells(&round.grid).len(), 14);
        assert_eq!(b.moves(), 1);
    }

    #[test]
    fn unchanged_shift_keeps_history() {
        let mut b = board();
        let initial = Grid::from([[2, 4, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]);
        b.set_initial_round(Round {
            grid: initial,
            score: 0,
        });
        assert!(b.shift(Direction::Left).is_none());
        assert!(b.shift(Direction::Up).is_none());
        assert_eq!(b.grid(), initial);
        assert_eq!(b.moves(), 0);
    }

    #[test]
    fn game_over_on_locked_grid() {
        let mut b = board();
        b.set_initial_round(Round {
            grid: Grid::from([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]),
            score: 0,
        });
        assert!(b.is_game_over());
        for direction in Direction::ALL {
            assert!(b.shift(direction).is_none());
        }
    }
}
