//! Pseudo-legal move generation, legality filtering and attack queries.
//!
//! Every query here is built on `pseudo_moves`. Legality is decided by
//! simulating the move on a scratch copy and asking whether the mover's king
//! is attacked afterwards.

use crate::position::Position;
use crate::types::{CastleSide, Color, Move, PieceKind, Square, SquareSet};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl Position {
    /// Destinations reachable by the piece on `from`, ignoring own-king safety.
    pub fn pseudo_moves(&self, from: Square) -> Vec<Square> {
        let mut out = Vec::new();
        let Some(piece) = self.piece_at(from) else {
            return out;
        };
        match piece.kind {
            PieceKind::Pawn => self.pawn_targets(from, piece.color, &mut out),
            PieceKind::Knight => self.step_targets(from, piece.color, &KNIGHT_OFFSETS, &mut out),
            PieceKind::King => self.step_targets(from, piece.color, &KING_OFFSETS, &mut out),
            PieceKind::Bishop => self.ray_targets(from, piece.color, &BISHOP_DIRECTIONS, &mut out),
            PieceKind::Rook => self.ray_targets(from, piece.color, &ROOK_DIRECTIONS, &mut out),
            PieceKind::Queen => {
                self.ray_targets(from, piece.color, &BISHOP_DIRECTIONS, &mut out);
                self.ray_targets(from, piece.color, &ROOK_DIRECTIONS, &mut out);
            }
        }
        out
    }

    fn pawn_targets(&self, from: Square, color: Color, out: &mut Vec<Square>) {
        let forward = color.forward();

        if let Some(one) = from.offset(forward, 0) {
            if self.piece_at(one).is_none() {
                out.push(one);
                // Double push only through an empty intermediate square.
                if from.row == color.pawn_row() {
                    if let Some(two) = from.offset(2 * forward, 0) {
                        if self.piece_at(two).is_none() {
                            out.push(two);
                        }
                    }
                }
            }
        }

        for dc in [-1, 1] {
            let Some(diag) = from.offset(forward, dc) else {
                continue;
            };
            match self.piece_at(diag) {
                Some(target) if target.color != color => out.push(diag),
                None if self.en_passant() == Some(diag) => out.push(diag),
                _ => {}
            }
        }
    }

    fn step_targets(&self, from: Square, color: Color, offsets: &[(i8, i8)], out: &mut Vec<Square>) {
        for &(dr, dc) in offsets {
            if let Some(to) = from.offset(dr, dc) {
                match self.piece_at(to) {
                    Some(p) if p.color == color => {}
                    _ => out.push(to),
                }
            }
        }
    }

    fn ray_targets(&self, from: Square, color: Color, directions: &[(i8, i8)], out: &mut Vec<Square>) {
        for &(dr, dc) in directions {
            let mut cursor = from.offset(dr, dc);
            while let Some(to) = cursor {
                match self.piece_at(to) {
                    None => out.push(to),
                    Some(p) => {
                        if p.color != color {
                            out.push(to);
                        }
                        break;
                    }
                }
                cursor = to.offset(dr, dc);
            }
        }
    }

    /// Describe the move `from -> to` against the current board.
    ///
    /// A pawn reaching the last rank promotes to `promotion`, or to a queen when
    /// none is given. Returns `None` if `from` is empty or `promotion` is a pawn
    /// or king.
    pub fn build_move(&self, from: Square, to: Square, promotion: Option<PieceKind>) -> Option<Move> {
        if promotion.is_some_and(|kind| !kind.is_promotion_target()) {
            return None;
        }
        let piece = self.piece_at(from)?;
        let is_pawn = piece.kind == PieceKind::Pawn;

        let is_en_passant = is_pawn
            && from.col != to.col
            && self.piece_at(to).is_none()
            && self.en_passant() == Some(to);
        let captured = if is_en_passant {
            self.piece_at(Square::new(from.row, to.col))
        } else {
            self.piece_at(to)
        };

        let promotion = if is_pawn && to.row == piece.color.promotion_row() {
            Some(promotion.unwrap_or(PieceKind::Queen))
        } else {
            None
        };

        let castle = if piece.kind == PieceKind::King && from.row == to.row && from.col.abs_diff(to.col) == 2 {
            Some(if to.col > from.col {
                CastleSide::KingSide
            } else {
                CastleSide::QueenSide
            })
        } else {
            None
        };

        Some(Move {
            from,
            to,
            piece,
            captured,
            promotion,
            is_double_pawn_push: is_pawn && from.row.abs_diff(to.row) == 2,
            is_en_passant,
            castle,
        })
    }

    /// Pseudo destinations of `from` that keep its own king out of check.
    pub fn legal_moves(&self, from: Square) -> Vec<Square> {
        let Some(piece) = self.piece_at(from) else {
            return Vec::new();
        };
        let mut scratch = *self;
        self.pseudo_moves(from)
            .into_iter()
            .filter(|&to| match self.build_move(from, to, None) {
                Some(mv) => !scratch.with_move(&mv, |after| after.is_king_in_check(piece.color)),
                None => false,
            })
            .collect()
    }

    /// Every legal move for the side to move.
    pub fn all_legal_moves(&self) -> Vec<Move> {
        let side = self.side_to_move();
        self.pieces(side)
            .flat_map(|(from, _)| {
                self.legal_moves(from)
                    .into_iter()
                    .filter_map(move |to| self.build_move(from, to, None))
            })
            .collect()
    }

    /// Pseudo destinations of `from` that hold an enemy piece.
    pub fn attacks_from(&self, from: Square) -> Vec<Square> {
        let Some(piece) = self.piece_at(from) else {
            return Vec::new();
        };
        self.pseudo_moves(from)
            .into_iter()
            .filter(|&to| matches!(self.piece_at(to), Some(p) if p.color != piece.color))
            .collect()
    }

    /// Union of pseudo destinations of every piece of `color`.
    pub fn all_attacked_squares(&self, color: Color) -> SquareSet {
        self.pieces(color)
            .flat_map(|(sq, _)| self.pseudo_moves(sq))
            .collect()
    }

    /// Whether `color`'s king is attacked. A missing king is never in check.
    pub fn is_king_in_check(&self, color: Color) -> bool {
        match self.king_square(color) {
            Some(king) => self.all_attacked_squares(color.other()).contains(king),
            None => false,
        }
    }

    /// Squares a piece of `color` can move to and give check from.
    pub fn possible_checks(&self, color: Color) -> SquareSet {
        let mut scratch = *self;
        let mut checks = SquareSet::EMPTY;
        for (from, _) in self.pieces(color) {
            for to in self.pseudo_moves(from) {
                let Some(mv) = self.build_move(from, to, None) else {
                    continue;
                };
                if scratch.with_move(&mv, |after| after.is_king_in_check(color.other())) {
                    checks.insert(to);
                }
            }
        }
        checks
    }
}
