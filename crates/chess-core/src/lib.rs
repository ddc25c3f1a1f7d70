//! Chess rules core.
//!
//! Board state, legal-move generation with check detection, algebraic
//! notation decoding/encoding, PGN movetext reading, the one-ply move
//! heuristic and the live-play `Game` controller. Everything here is
//! synchronous; the async evaluation pipeline lives in `analysis-worker`.

pub mod error;
pub mod game;
pub mod game_data;
pub mod heuristic;
mod movegen;
pub mod notation;
pub mod pgn;
pub mod position;
pub mod types;

pub use error::ChessError;
pub use game::{Game, PlayedMove};
pub use game_data::{GameMetadata, GameRecord};
pub use heuristic::{material_value, score};
pub use notation::{decode, decode_replay, encode, normalize, san_to_uci, DecodeMode};
pub use position::{Position, Undo, STANDARD_START_FEN};
pub use types::{CastleSide, Color, Move, Piece, PieceKind, Square, SquareSet};
