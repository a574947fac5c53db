//! Shuffled start layouts. Each back rank is dealt independently under
//! the variant constraints; pawns and the trailing FEN fields are kept
//! from the standard start.

use rand::Rng;

use super::fen::Position;
use super::{Piece, PieceKind, Side, Square, BOARD_FILES};

/// Deals both back ranks and returns the full start FEN.
pub fn shuffled_start_fen<R: Rng>(rng: &mut R) -> String {
    let white = shuffled_back_rank(rng);
    let black = shuffled_back_rank(rng);
    let mut pos = Position::start();
    for file in 0..BOARD_FILES {
        let kind = white[file as usize];
        pos.set_piece(Square::new(file, 0), Some(Piece { side: Side::White, kind }));
        let kind = black[file as usize];
        pos.set_piece(Square::new(file, 9), Some(Piece { side: Side::Black, kind }));
    }
    pos.to_fen()
}

/// One back rank: king strictly between the rooks, bishops on opposite
/// square colors, queen and princess both on odd files. Deals that leave
/// too few odd files are thrown away and re-dealt.
pub fn shuffled_back_rank<R: Rng>(rng: &mut R) -> [PieceKind; 10] {
    loop {
        if let Some(rank) = try_back_rank(rng) {
            return rank;
        }
    }
}

fn try_back_rank<R: Rng>(rng: &mut R) -> Option<[PieceKind; 10]> {
    // Squares never assigned below stay knights.
    let mut rank = [PieceKind::Knight; 10];
    let mut free: Vec<u8> = (0..10).collect();

    let mut royal = [pluck(rng, &mut free), pluck(rng, &mut free), pluck(rng, &mut free)];
    royal.sort_unstable();
    rank[royal[0] as usize] = PieceKind::Rook;
    rank[royal[1] as usize] = PieceKind::King;
    rank[royal[2] as usize] = PieceKind::Rook;

    // Within one rank the square color alternates with the file, so
    // opposite-color bishops means one even file and one odd file.
    let light: Vec<u8> = free.iter().copied().filter(|f| f % 2 == 0).collect();
    let dark: Vec<u8> = free.iter().copied().filter(|f| f % 2 == 1).collect();
    if light.is_empty() || dark.is_empty() {
        return None;
    }
    let b1 = light[rng.gen_range(0..light.len())];
    let b2 = dark[rng.gen_range(0..dark.len())];
    free.retain(|f| *f != b1 && *f != b2);
    rank[b1 as usize] = PieceKind::Bishop;
    rank[b2 as usize] = PieceKind::Bishop;

    let mut odd: Vec<u8> = free.iter().copied().filter(|f| f % 2 == 1).collect();
    if odd.len() < 2 {
        return None;
    }
    let queen = odd.swap_remove(rng.gen_range(0..odd.len()));
    let princess = odd.swap_remove(rng.gen_range(0..odd.len()));
    free.retain(|f| *f != queen && *f != princess);
    rank[queen as usize] = PieceKind::Queen;
    rank[princess as usize] = PieceKind::Princess;

    let prince = pluck(rng, &mut free);
    rank[prince as usize] = PieceKind::Prince;
    // The last two free files keep their knights.
    Some(rank)
}

fn pluck<R: Rng>(rng: &mut R, free: &mut Vec<u8>) -> u8 {
    free.swap_remove(rng.gen_range(0..free.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn count(rank: &[PieceKind; 10], kind: PieceKind) -> usize {
        rank.iter().filter(|k| **k == kind).count()
    }

    #[test]
    fn back_rank_satisfies_constraints() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let rank = shuffled_back_rank(&mut rng);

            assert_eq!(count(&rank, PieceKind::Rook), 2);
            assert_eq!(count(&rank, PieceKind::Knight), 2);
            assert_eq!(count(&rank, PieceKind::Bishop), 2);
            assert_eq!(count(&rank, PieceKind::Queen), 1);
            assert_eq!(count(&rank, PieceKind::King), 1);
            assert_eq!(count(&rank, PieceKind::Prince), 1);
            assert_eq!(count(&rank, PieceKind::Princess), 1);

            let rooks: Vec<usize> =
                (0..10).filter(|f| rank[*f] == PieceKind::Rook).collect();
            let king = (0..10).find(|f| rank[*f] == PieceKind::King).unwrap();
            assert!(rooks[0] < king && king < rooks[1], "king off {rooks:?} in {rank:?}");

            let bishops: Vec<usize> =
                (0..10).filter(|f| rank[*f] == PieceKind::Bishop).collect();
            assert_ne!(bishops[0] % 2, bishops[1] % 2, "same-color bishops in {rank:?}");

            for f in 0..10 {
                if rank[f] == PieceKind::Queen || rank[f] == PieceKind::Princess {
                    assert_eq!(f % 2, 1, "{:?} on even file in {rank:?}", rank[f]);
                }
            }
        }
    }

    #[test]
    fn shuffled_fen_parses_and_keeps_pawns() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..20 {
            let fen = shuffled_start_fen(&mut rng);
            let pos = Position::from_fen(&fen).expect("generated fen parses");
            for file in 0..BOARD_FILES {
                let white = pos.piece_at(Square::new(file, 1)).unwrap();
                let black = pos.piece_at(Square::new(file, 8)).unwrap();
                assert_eq!(white.kind, PieceKind::Pawn);
                assert_eq!(black.kind, PieceKind::Pawn);
            }
            assert!(fen.ends_with("w KQkq Ss - 0 1"), "trailing fields kept: {fen}");
        }
    }
}
