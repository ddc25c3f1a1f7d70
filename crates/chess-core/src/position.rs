//! Board snapshot with side to move, en-passant target and move counters.
//!
//! `apply` / `revert` are the only way the board is mutated. Simulation code
//! goes through `with_move`, which reverts through a drop guard so the
//! position is restored on every exit path.

use std::fmt;

use crate::error::ChessError;
use crate::types::{CastleSide, Color, Move, Piece, PieceKind, Square};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    board: [[Option<Piece>; 8]; 8],
    side_to_move: Color,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

/// State needed to take back one `apply`.
///
/// Records the prior contents of every square the move touched, so reverting
/// is exact even when the move was decoded from an untrusted record.
#[derive(Clone, Copy, Debug)]
pub struct Undo {
    touched: [Option<(Square, Option<Piece>)>; 5],
    side_to_move: Color,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Undo {
    fn capture(position: &Position) -> Self {
        Self {
            touched: [None; 5],
            side_to_move: position.side_to_move,
            en_passant: position.en_passant,
            halfmove_clock: position.halfmove_clock,
            fullmove_number: position.fullmove_number,
        }
    }

    fn record(&mut self, position: &Position, sq: Square) {
        if self.touched.iter().flatten().any(|(s, _)| *s == sq) {
            return;
        }
        if let Some(slot) = self.touched.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some((sq, position.piece_at(sq)));
        }
    }
}

struct RevertGuard<'a> {
    position: &'a mut Position,
    undo: Option<Undo>,
}

impl Drop for RevertGuard<'_> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            self.position.revert(undo);
        }
    }
}

impl Position {
    /// Board with no pieces.
    pub fn empty(side_to_move: Color) -> Self {
        Self {
            board: [[None; 8]; 8],
            side_to_move,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Standard initial setup, white to move.
    pub fn standard() -> Self {
        let mut pos = Position::empty(Color::White);
        for (col, kind) in BACK_RANK.iter().enumerate() {
            pos.board[0][col] = Some(Piece::new(*kind, Color::Black));
            pos.board[1][col] = Some(Piece::new(PieceKind::Pawn, Color::Black));
            pos.board[6][col] = Some(Piece::new(PieceKind::Pawn, Color::White));
            pos.board[7][col] = Some(Piece::new(*kind, Color::White));
        }
        pos
    }

    /// Build a position from explicit placements. Rejects duplicate squares and
    /// more than one king per colour.
    pub fn from_pieces(side_to_move: Color, pieces: &[(Square, Piece)]) -> Result<Self, ChessError> {
        let mut pos = Position::empty(side_to_move);
        for (sq, piece) in pieces {
            if pos.piece_at(*sq).is_some() {
                return Err(ChessError::InvalidPosition(format!("two pieces on {sq}")));
            }
            pos.set(*sq, Some(*piece));
        }
        pos.validate()?;
        Ok(pos)
    }

    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let invalid = |msg: &str| ChessError::InvalidPosition(format!("{msg}: {fen}"));
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or_else(|| invalid("empty FEN"))?;

        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(invalid("expected 8 ranks"));
        }

        let mut pos = Position::empty(Color::White);
        for (row, text) in rows.iter().enumerate() {
            let mut col = 0usize;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    col += skip as usize;
                } else {
                    let piece = Piece::from_fen_char(c).ok_or_else(|| invalid("bad piece letter"))?;
                    if col >= 8 {
                        return Err(invalid("rank too long"));
                    }
                    pos.board[row][col] = Some(piece);
                    col += 1;
                }
            }
            if col != 8 {
                return Err(invalid("rank has wrong length"));
            }
        }

        pos.side_to_move = match fields.next() {
            None | Some("w") => Color::White,
            Some("b") => Color::Black,
            Some(_) => return Err(invalid("bad side to move")),
        };

        // Castling rights are accepted but not tracked.
        let _castling = fields.next();

        pos.en_passant = match fields.next() {
            None | Some("-") => None,
            Some(sq) => Some(sq.parse()?),
        };
        pos.halfmove_clock = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0);
        pos.fullmove_number = fields.next().and_then(|v| v.parse().ok()).unwrap_or(1);

        pos.validate()?;
        Ok(pos)
    }

    pub fn to_fen(&self) -> String {
        let mut out = String::new();
        for row in 0..8 {
            let mut empty = 0;
            for col in 0..8 {
                match self.board[row][col] {
                    Some(piece) => {
                        if empty > 0 {
                            out.push_str(&empty.to_string());
                            empty = 0;
                        }
                        out.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push_str(&empty.to_string());
            }
            if row < 7 {
                out.push('/');
            }
        }
        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let ep = self
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{out} {side} - {ep} {} {}",
            self.halfmove_clock, self.fullmove_number
        )
    }

    fn validate(&self) -> Result<(), ChessError> {
        for color in [Color::White, Color::Black] {
            let kings = self
                .pieces(color)
                .filter(|(_, p)| p.kind == PieceKind::King)
                .count();
            if kings > 1 {
                return Err(ChessError::InvalidPosition(format!(
                    "{kings} {color:?} kings on the board"
                )));
            }
        }
        Ok(())
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq.row as usize][sq.col as usize]
    }

    pub(crate) fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.board[sq.row as usize][sq.col as usize] = piece;
    }

    fn take(&mut self, sq: Square) -> Option<Piece> {
        self.board[sq.row as usize][sq.col as usize].take()
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Occupied squares of one colour, row by row from a8.
    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| match self.piece_at(sq) {
            Some(p) if p.color == color => Some((sq, p)),
            _ => None,
        })
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces(color)
            .find(|(_, p)| p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    /// Play `mv` in place and return what is needed to take it back.
    ///
    /// The mover's colour is taken from the piece on `from` (or `mv.piece` when
    /// the square is empty), so simulations of the non-moving side work too.
    pub fn apply(&mut self, mv: &Move) -> Undo {
        let mut undo = Undo::capture(self);
        let capture_sq = mv.capture_square();
        let rook_squares = mv.castle.map(|side| castle_rook_squares(mv.from.row, side));

        undo.record(self, mv.from);
        undo.record(self, mv.to);
        undo.record(self, capture_sq);
        if let Some((rook_from, rook_to)) = rook_squares {
            undo.record(self, rook_from);
            undo.record(self, rook_to);
        }

        let moving = self.take(mv.from).unwrap_or(mv.piece);
        let captured = if capture_sq != mv.to {
            self.take(capture_sq)
        } else {
            self.piece_at(mv.to)
        };
        let placed = match mv.promotion {
            Some(kind) => Piece::new(kind, moving.color),
            None => moving,
        };
        self.set(mv.to, Some(placed));

        if let Some((rook_from, rook_to)) = rook_squares {
            if let Some(rook) = self.take(rook_from) {
                self.set(rook_to, Some(rook));
            }
        }

        self.en_passant = None;
        if moving.kind == PieceKind::Pawn && mv.from.row.abs_diff(mv.to.row) == 2 {
            self.en_passant = Some(Square::new((mv.from.row + mv.to.row) / 2, mv.from.col));
        }

        if moving.kind == PieceKind::Pawn || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if moving.color == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = moving.color.other();

        undo
    }

    pub fn revert(&mut self, undo: Undo) {
        for (sq, piece) in undo.touched.iter().rev().flatten() {
            self.set(*sq, *piece);
        }
        self.side_to_move = undo.side_to_move;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.fullmove_number = undo.fullmove_number;
    }

    /// Run `f` against the position after `mv`, then restore the position.
    pub fn with_move<R>(&mut self, mv: &Move, f: impl FnOnce(&Position) -> R) -> R {
        let undo = self.apply(mv);
        let guard = RevertGuard {
            position: self,
            undo: Some(undo),
        };
        f(&*guard.position)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::standard()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}

/// Rook (from, to) squares for a castle on `row`.
pub(crate) fn castle_rook_squares(row: u8, side: CastleSide) -> (Square, Square) {
    match side {
        CastleSide::KingSide => (Square::new(row, 7), Square::new(row, 5)),
        CastleSide::QueenSide => (Square::new(row, 0), Square::new(row, 3)),
    }
}
