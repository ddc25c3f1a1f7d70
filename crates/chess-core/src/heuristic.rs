//! One-ply move scoring for the automated mover.

use rand::Rng;

use crate::position::Position;
use crate::types::{Move, PieceKind};

const CAPTURE_WEIGHT: f64 = 10.0;
const CHECK_BONUS: f64 = 5.0;
const HANGING_WEIGHT: f64 = 5.0;
const JITTER: f64 = 0.01;

pub fn material_value(kind: PieceKind) -> u32 {
    match kind {
        PieceKind::Pawn => 1,
        PieceKind::Knight | PieceKind::Bishop => 3,
        PieceKind::Rook => 5,
        PieceKind::Queen => 9,
        PieceKind::King => 0,
    }
}

/// Score `mv` with thread-local jitter. See [`score_with_rng`].
pub fn score(position: &Position, mv: &Move) -> f64 {
    score_with_rng(position, mv, &mut rand::thread_rng())
}

/// Static evaluation of a single candidate move from the mover's side.
///
/// Adds a jitter in `[0, 0.01)` to break ties, rewards captures (en passant
/// included), checks and newly attacked enemy material, and penalises
/// landing on a square the opponent attacks. `position` is left untouched.
pub fn score_with_rng<R: Rng + ?Sized>(position: &Position, mv: &Move, rng: &mut R) -> f64 {
    let mut total = rng.gen_range(0.0..JITTER);

    if let Some(captured) = mv.captured {
        total += CAPTURE_WEIGHT * f64::from(material_value(captured.kind));
    }

    let mover = mv.piece.color;
    let mut scratch = *position;
    total += scratch.with_move(mv, |after| {
        let mut delta = 0.0;
        if after.is_king_in_check(mover.other()) {
            delta += CHECK_BONUS;
        }
        delta += after
            .attacks_from(mv.to)
            .into_iter()
            .filter_map(|sq| after.piece_at(sq))
            .map(|p| f64::from(material_value(p.kind)))
            .sum::<f64>();
        if after.all_attacked_squares(mover.other()).contains(mv.to) {
            delta -= HANGING_WEIGHT * f64::from(material_value(mv.piece.kind));
        }
        delta
    });

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sq(s: &str) -> crate::types::Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_material_values() {
        assert_eq!(material_value(PieceKind::Pawn), 1);
        assert_eq!(material_value(PieceKind::Knight), 3);
        assert_eq!(material_value(PieceKind::Bishop), 3);
        assert_eq!(material_value(PieceKind::Rook), 5);
        assert_eq!(material_value(PieceKind::Queen), 9);
        assert_eq!(material_value(PieceKind::King), 0);
    }

    #[test]
    fn test_capture_beats_quiet_move() {
        // Rook on a1 can take the knight on a5 or stop on a4.
        let pos = Position::from_fen("4k3/8/8/n7/8/8/8/R3K3 w - - 0 1").unwrap();
        let capture = pos.build_move(sq("a1"), sq("a5"), None).unwrap();
        let quiet = pos.build_move(sq("a1"), sq("a4"), None).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(score_with_rng(&pos, &capture, &mut rng) > score_with_rng(&pos, &quiet, &mut rng));
    }

    #[test]
    fn test_en_passant_counts_as_capture() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep = pos.build_move(sq("e5"), sq("d6"), None).unwrap();
        assert!(ep.is_en_passant);
        assert!(score(&pos, &ep) >= CAPTURE_WEIGHT);
    }

    #[test]
    fn test_attacked_destination_is_negative() {
        // The d6 pawn covers e5.
        let pos = Position::from_fen("4k3/8/3p4/8/8/8/8/4QK2 w - - 0 1").unwrap();
        let mv = pos.build_move(sq("e1"), sq("e5"), None).unwrap();
        assert!(score(&pos, &mv) < 0.0);
    }

    #[test]
    fn test_check_bonus() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let check = pos.build_move(sq("a1"), sq("a8"), None).unwrap();
        let quiet = pos.build_move(sq("a1"), sq("a7"), None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let check_score = score_with_rng(&pos, &check, &mut rng);
        let quiet_score = score_with_rng(&pos, &quiet, &mut rng);
        assert!(check_score >= CHECK_BONUS);
        assert!(check_score > quiet_score);
    }

    #[test]
    fn test_fork_adds_attacked_material() {
        // Ne2-c3 hits the queen on b5 and the rook on d5; Ne2-g1 hits nothing.
        let pos = Position::from_fen("7k/8/8/1q1r4/8/8/4N2K/8 w - - 0 1").unwrap();
        let fork = pos.build_move(sq("e2"), sq("c3"), None).unwrap();
        let quiet = pos.build_move(sq("e2"), sq("g1"), None).unwrap();
        let fork_score = score_with_rng(&pos, &fork, &mut StdRng::seed_from_u64(3));
        let quiet_score = score_with_rng(&pos, &quiet, &mut StdRng::seed_from_u64(3));
        assert!((fork_score - quiet_score - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_hanging_penalty_uses_moving_piece() {
        // a8=Q checks along the long diagonal and eyes the h8 rook, which covers a8.
        let pos = Position::from_fen("7r/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        let promo = pos.build_move(sq("a7"), sq("a8"), Some(PieceKind::Queen)).unwrap();
        let total = score_with_rng(&pos, &promo, &mut StdRng::seed_from_u64(5));
        // check 5 + rook 5 - 5 * pawn 1
        assert!((5.0..5.0 + JITTER).contains(&total), "score {total}");
    }

    #[test]
    fn test_score_leaves_position_untouched() {
        let pos = Position::standard();
        let before = pos;
        for mv in pos.all_legal_moves() {
            score(&pos, &mv);
        }
        assert_eq!(pos, before);
    }
}
