//! Live-play controller: owns the position and the move history of one game.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ChessError;
use crate::heuristic;
use crate::notation;
use crate::position::Position;
use crate::types::{Color, Move, Piece, PieceKind, Square};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayedMove {
    pub mv: Move,
    /// Token as shown in the move list, `+` included.
    pub san: String,
    pub gives_check: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Game {
    position: Position,
    history: Vec<PlayedMove>,
    captured_by_white: Vec<Piece>,
    captured_by_black: Vec<Piece>,
}

impl Game {
    pub fn new() -> Self {
        Self::from_position(Position::standard())
    }

    pub fn from_position(position: Position) -> Self {
        Self {
            position,
            history: Vec::new(),
            captured_by_white: Vec::new(),
            captured_by_black: Vec::new(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    pub fn history(&self) -> &[PlayedMove] {
        &self.history
    }

    /// Pieces `color` has taken from the opponent, in capture order.
    pub fn captured(&self, color: Color) -> &[Piece] {
        match color {
            Color::White => &self.captured_by_white,
            Color::Black => &self.captured_by_black,
        }
    }

    /// Legal destinations for the piece on `from`. Empty for the side not on move.
    pub fn legal_moves(&self, from: Square) -> Vec<Square> {
        match self.position.piece_at(from) {
            Some(piece) if piece.color == self.side_to_move() => self.position.legal_moves(from),
            _ => Vec::new(),
        }
    }

    pub fn is_in_check(&self) -> bool {
        self.position.is_king_in_check(self.side_to_move())
    }

    pub fn play(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<PlayedMove, ChessError> {
        let illegal = || ChessError::IllegalMove(format!("{from}{to}"));

        if !self.legal_moves(from).contains(&to) {
            return Err(illegal());
        }
        let mv = self
            .position
            .build_move(from, to, promotion)
            .ok_or_else(illegal)?;
        Ok(self.commit(mv))
    }

    /// Pick the best-scoring legal move for the side to move, if any.
    pub fn choose_move(&self) -> Option<Move> {
        self.choose_move_with_rng(&mut rand::thread_rng())
    }

    pub fn choose_move_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Move> {
        self.position
            .all_legal_moves()
            .into_iter()
            .map(|mv| (heuristic::score_with_rng(&self.position, &mv, rng), mv))
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, mv)| mv)
    }

    fn commit(&mut self, mv: Move) -> PlayedMove {
        let before = self.position;
        self.position.apply(&mv);

        let gives_check = self.position.is_king_in_check(mv.piece.color.other());
        let played = PlayedMove {
            mv,
            san: notation::encode(&mv, &before, gives_check),
            gives_check,
        };

        if let Some(piece) = mv.captured {
            match mv.piece.color {
                Color::White => self.captured_by_white.push(piece),
                Color::Black => self.captured_by_black.push(piece),
            }
        }
        self.history.push(played.clone());
        played
    }
}
