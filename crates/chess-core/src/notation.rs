//! Algebraic notation: normalization, decoding against a position, encoding.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ChessError;
use crate::position::Position;
use crate::types::{CastleSide, Color, Move, Piece, PieceKind, Square};

static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[+#!?]+").unwrap());

static EN_PASSANT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s*e\.p\.").unwrap());

/// Pawn move with a promotion suffix in any of `e8Q`, `e8=q`, `e8/Q`, `e8(Q)`.
static PROMOTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-h](?:x[a-h])?[18])(?:=|/|\()?([QRBNqrbn])\)?$").unwrap()
});

/// How strictly `decode_with` resolves a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Only legal candidates count; exactly one must remain.
    Strict,
    /// Trust the record: prefer a legal candidate, else take the first that reaches.
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedSan {
    Castle(CastleSide),
    Normal {
        kind: PieceKind,
        file: Option<u8>,
        rank_row: Option<u8>,
        capture: bool,
        to: Square,
        promotion: Option<PieceKind>,
    },
}

/// Canonical spelling of a move token.
///
/// Castling is written with letter O, check/mate/annotation marks and `e.p.`
/// are dropped, and promotions become `=<PIECE>`. Idempotent.
pub fn normalize(token: &str) -> String {
    // Removing one marker can splice another together (`e.e.p.p.`), so strip to a fixed point.
    let mut stripped = token.trim().to_string();
    loop {
        let next = ANNOTATION_RE.replace_all(&stripped, "");
        let next = EN_PASSANT_RE.replace_all(&next, "");
        let next = next.trim();
        if next == stripped {
            break;
        }
        stripped = next.to_string();
    }
    let s = stripped.as_str();

    if !s.is_empty() && s.contains('-') && s.chars().all(|c| matches!(c, 'O' | 'o' | '0' | '-')) {
        return s.replace(['0', 'o'], "O");
    }

    PROMOTION_RE
        .replace(s, |caps: &regex::Captures| {
            format!("{}={}", &caps[1], caps[2].to_ascii_uppercase())
        })
        .into_owned()
}

fn parse(san: &str) -> Result<ParsedSan, ChessError> {
    let unresolvable = || ChessError::UnresolvableMove(san.to_string());

    match san {
        "O-O" => return Ok(ParsedSan::Castle(CastleSide::KingSide)),
        "O-O-O" => return Ok(ParsedSan::Castle(CastleSide::QueenSide)),
        _ => {}
    }
    if !san.is_ascii() {
        return Err(unresolvable());
    }

    let (body, promotion) = match san.split_once('=') {
        Some((body, promo)) => {
            let mut chars = promo.chars();
            let kind = chars
                .next()
                .and_then(PieceKind::from_san_letter)
                .filter(|k| !matches!(k, PieceKind::King))
                .ok_or_else(unresolvable)?;
            if chars.next().is_some() {
                return Err(unresolvable());
            }
            (body, Some(kind))
        }
        None => (san, None),
    };

    let (kind, rest) = match body.chars().next().and_then(PieceKind::from_san_letter) {
        Some(kind) => (kind, &body[1..]),
        None => (PieceKind::Pawn, body),
    };
    if rest.len() < 2 {
        return Err(unresolvable());
    }

    let (prefix, dest) = rest.split_at(rest.len() - 2);
    let to: Square = dest.parse().map_err(|_| unresolvable())?;
    let (prefix, capture) = match prefix.strip_suffix('x') {
        Some(p) => (p, true),
        None => (prefix, false),
    };

    let mut file = None;
    let mut rank_row = None;
    for b in prefix.bytes() {
        match b {
            b'a'..=b'h' if file.is_none() => file = Some(b - b'a'),
            b'1'..=b'8' if rank_row.is_none() => rank_row = Some(b'8' - b),
            _ => return Err(unresolvable()),
        }
    }

    if kind == PieceKind::Pawn && capture && file.is_none() {
        return Err(unresolvable());
    }

    Ok(ParsedSan::Normal {
        kind,
        file,
        rank_row,
        capture,
        to,
        promotion,
    })
}

fn castle_move(color: Color, side: CastleSide) -> Move {
    let row = color.back_row();
    let to_col = match side {
        CastleSide::KingSide => 6,
        CastleSide::QueenSide => 2,
    };
    Move {
        from: Square::new(row, 4),
        to: Square::new(row, to_col),
        piece: Piece::new(PieceKind::King, color),
        captured: None,
        promotion: None,
        is_double_pawn_push: false,
        is_en_passant: false,
        castle: Some(side),
    }
}

/// Whether the piece on `from` can pseudo-reach `to` in the way the token describes.
fn reaches(position: &Position, from: Square, to: Square, kind: PieceKind, capture: bool) -> bool {
    if kind == PieceKind::Pawn && capture != (from.col != to.col) {
        return false;
    }
    position.pseudo_moves(from).contains(&to)
}

/// Strict decode: the token must name exactly one legal move.
pub fn decode(position: &Position, token: &str) -> Result<Move, ChessError> {
    decode_with(position, token, DecodeMode::Strict)
}

/// Best-effort decode used when replaying recorded games.
pub fn decode_replay(position: &Position, token: &str) -> Result<Move, ChessError> {
    decode_with(position, token, DecodeMode::Replay)
}

pub fn decode_with(position: &Position, token: &str, mode: DecodeMode) -> Result<Move, ChessError> {
    let san = normalize(token);
    let color = position.side_to_move();

    let (kind, file, rank_row, capture, to, promotion) = match parse(&san)? {
        ParsedSan::Castle(side) => return Ok(castle_move(color, side)),
        ParsedSan::Normal {
            kind,
            file,
            rank_row,
            capture,
            to,
            promotion,
        } => (kind, file, rank_row, capture, to, promotion),
    };

    let reaching: Vec<Square> = position
        .pieces(color)
        .filter(|(_, p)| p.kind == kind)
        .map(|(sq, _)| sq)
        .filter(|&from| reaches(position, from, to, kind, capture))
        .collect();
    let narrowed: Vec<Square> = reaching
        .iter()
        .copied()
        .filter(|sq| file.map_or(true, |f| sq.col == f) && rank_row.map_or(true, |r| sq.row == r))
        .collect();

    let from = match mode {
        DecodeMode::Strict => {
            let legal: Vec<Square> = narrowed
                .into_iter()
                .filter(|&from| position.legal_moves(from).contains(&to))
                .collect();
            match legal.as_slice() {
                [] => return Err(ChessError::IllegalMove(san)),
                [only] => *only,
                many => {
                    return Err(ChessError::AmbiguousMove {
                        token: san,
                        candidates: many.len(),
                    })
                }
            }
        }
        DecodeMode::Replay => {
            // A disambiguation that matches nothing is ignored rather than fatal.
            let pool = if narrowed.is_empty() { reaching } else { narrowed };
            let legal = pool
                .iter()
                .copied()
                .find(|&from| position.legal_moves(from).contains(&to));
            legal
                .or_else(|| pool.first().copied())
                .ok_or_else(|| ChessError::UnresolvableMove(san.clone()))?
        }
    };

    let mv = position
        .build_move(from, to, promotion)
        .ok_or_else(|| ChessError::UnresolvableMove(san.clone()))?;

    if mode == DecodeMode::Strict {
        if mv.is_capture() != capture {
            return Err(ChessError::IllegalMove(san));
        }
        if promotion.is_some() && mv.promotion.is_none() {
            return Err(ChessError::IllegalMove(san));
        }
    }

    Ok(mv)
}

/// Render `mv` (played from `position`) as a notation token.
///
/// Pawns write the destination, or `<file>x<dest>` on a capture. Other pieces
/// write `<PIECE><x?><dest>`. `+` is appended when the move gives check.
pub fn encode(mv: &Move, position: &Position, gives_check: bool) -> String {
    let mut out = String::new();
    match mv.castle {
        Some(CastleSide::KingSide) => out.push_str("O-O"),
        Some(CastleSide::QueenSide) => out.push_str("O-O-O"),
        None => {
            let capture = mv.is_capture() || position.piece_at(mv.to).is_some();
            match mv.piece.kind.san_letter() {
                None => {
                    if capture {
                        out.push(mv.from.file_char());
                        out.push('x');
                    }
                }
                Some(letter) => {
                    out.push(letter);
                    if capture {
                        out.push('x');
                    }
                }
            }
            out.push_str(&mv.to.to_string());
            if let Some(letter) = mv.promotion.and_then(PieceKind::san_letter) {
                out.push('=');
                out.push(letter);
            }
        }
    }
    if gives_check {
        out.push('+');
    }
    out
}

/// Decode a token sequence from the initial position, returning the moves played.
pub fn replay<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Move>, ChessError> {
    let mut position = Position::standard();
    let mut moves = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = normalize(token.as_ref());
        if token.is_empty() {
            continue;
        }
        let mv = decode_replay(&position, &token)?;
        position.apply(&mv);
        moves.push(mv);
    }
    Ok(moves)
}

/// Convert a token sequence into long algebraic moves (`e2e4`, ...).
pub fn san_to_uci<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<String>, ChessError> {
    Ok(replay(tokens)?.iter().map(Move::to_uci).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_variants() {
        assert_eq!(normalize("0-0"), "O-O");
        assert_eq!(normalize("0-0-0+"), "O-O-O");
        assert_eq!(normalize("O-O#"), "O-O");
        assert_eq!(normalize("Nf3+"), "Nf3");
        assert_eq!(normalize("Qxf7#"), "Qxf7");
        assert_eq!(normalize("e4!?"), "e4");
        assert_eq!(normalize("Bb5??"), "Bb5");
        assert_eq!(normalize("exd6 e.p."), "exd6");
        assert_eq!(normalize("exd6e.p."), "exd6");
        assert_eq!(normalize("e.e.p.p."), "");
        assert_eq!(normalize("e8Q"), "e8=Q");
        assert_eq!(normalize("e8=q+"), "e8=Q");
        assert_eq!(normalize("bxa1(N)"), "bxa1=N");
        assert_eq!(normalize("d1/R"), "d1=R");
        assert_eq!(normalize(" Kd2 "), "Kd2");
    }

    #[test]
    fn test_normalize_idempotent() {
        let tokens = [
            "0-0", "O-O-O+", "e8Q", "e8=Q", "exd6 e.p.", "Nbd7!", "R1e2", "Qh4#", "a1=n", "bxc8/Q",
            "Kxe2?!", "", "--", "1-0", "e.e.p.p.", "e+.p.", "Nf3 e.p.+",
        ];
        for token in tokens {
            let once = normalize(token);
            assert_eq!(normalize(&once), once, "token {token:?}");
        }
    }

    #[test]
    fn test_decode_opening_moves() {
        let pos = Position::standard();
        let mv = decode(&pos, "e4").unwrap();
        assert_eq!(mv.to_uci(), "e2e4");
        assert!(mv.is_double_pawn_push);

        let mv = decode(&pos, "Nf3").unwrap();
        assert_eq!(mv.to_uci(), "g1f3");

        assert!(matches!(decode(&pos, "e5"), Err(ChessError::IllegalMove(_))));
        assert!(matches!(decode(&pos, "Zz9"), Err(ChessError::UnresolvableMove(_))));
    }

    #[test]
    fn test_decode_disambiguation() {
        // Knights on b1 and f3 can both reach d2.
        let pos = Position::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        assert!(matches!(
            decode(&pos, "Nd2"),
            Err(ChessError::AmbiguousMove { candidates: 2, .. })
        ));
        assert_eq!(decode(&pos, "Nbd2").unwrap().from, sq("b1"));
        assert_eq!(decode(&pos, "Nfd2").unwrap().from, sq("f3"));

        // Rooks on the same file need a rank.
        let rooks = Position::from_fen("4k3/R7/8/8/8/8/R7/4K3 w - - 0 1").unwrap();
        assert_eq!(decode(&rooks, "R2a5").unwrap().from, sq("a2"));
        assert_eq!(decode(&rooks, "R7a5").unwrap().from, sq("a7"));
        assert_eq!(decode(&rooks, "Ra2a5").unwrap().from, sq("a2"));
    }

    #[test]
    fn test_decode_pinned_candidate_is_not_ambiguous() {
        // The c3 knight is pinned by the b4 bishop, so Ne2 can only mean the g1 knight.
        let pos = Position::from_fen("4k3/8/8/8/1b6/2N5/8/4K1N1 w - - 0 1").unwrap();
        assert_eq!(decode(&pos, "Ne2").unwrap().from, sq("g1"));
    }

    #[test]
    fn test_decode_en_passant_and_promotion() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = decode(&pos, "exd6 e.p.").unwrap();
        assert!(mv.is_en_passant);
        assert_eq!(mv.capture_square(), sq("d5"));

        let promo = Position::from_fen("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = decode(&promo, "axb8=N+").unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Knight));
        assert_eq!(mv.to_uci(), "a7b8n");

        let mv = decode(&promo, "a8").unwrap();
        assert_eq!(mv.to_uci(), "a7a8q");
    }

    #[test]
    fn test_decode_capture_marker_must_agree() {
        let pos = Position::standard();
        assert!(matches!(decode(&pos, "Nxf3"), Err(ChessError::IllegalMove(_))));
        assert!(decode_replay(&pos, "Nxf3").is_ok());
    }

    #[test]
    fn test_decode_castling_for_both_sides() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        let mv = decode(&pos, "0-0-0").unwrap();
        assert_eq!(mv.to_uci(), "e8c8");
        assert_eq!(mv.castle, Some(CastleSide::QueenSide));

        let white = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(decode(&white, "O-O").unwrap().to_uci(), "e1g1");
    }

    #[test]
    fn test_replay_ignores_wrong_disambiguation() {
        let pos = Position::from_fen("4k3/8/8/8/8/5N2/8/4K3 w - - 0 1").unwrap();
        assert_eq!(decode_replay(&pos, "Nbd2").unwrap().from, sq("f3"));
        assert!(decode(&pos, "Nbd2").is_err());
    }

    #[test]
    fn test_encode() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K1N1 w - - 0 1").unwrap();
        let capture = pos.build_move(sq("e4"), sq("d5"), None).unwrap();
        assert_eq!(encode(&capture, &pos, false), "exd5");
        let push = pos.build_move(sq("e4"), sq("e5"), None).unwrap();
        assert_eq!(encode(&push, &pos, false), "e5");
        let knight = pos.build_move(sq("g1"), sq("f3"), None).unwrap();
        assert_eq!(encode(&knight, &pos, true), "Nf3+");
        assert_eq!(encode(&castle_move(Color::White, CastleSide::KingSide), &pos, false), "O-O");
    }

    #[test]
    fn test_san_to_uci_opening() {
        let uci = san_to_uci(&["e4", "e5", "Nf3", "Nc6"]).unwrap();
        assert_eq!(uci, vec!["e2e4", "e7e5", "g1f3", "b8c6"]);
    }

    #[test]
    fn test_san_to_uci_castling_and_en_passant() {
        let tokens = [
            "e4", "Nf6", "e5", "d5", "exd6 e.p.", "e6", "Nf3", "Be7", "Bc4", "0-0", "O-O",
        ];
        let uci = san_to_uci(&tokens).unwrap();
        assert_eq!(uci[4], "e5d6");
        assert_eq!(uci[9], "e8g8");
        assert_eq!(uci[10], "e1g1");
    }

    #[test]
    fn test_san_to_uci_fails_on_unresolvable_token() {
        let err = san_to_uci(&["e4", "e5", "Qh6"]).unwrap_err();
        assert!(matches!(err, ChessError::UnresolvableMove(_)));
    }
}
