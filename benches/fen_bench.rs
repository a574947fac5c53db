use criterion::{criterion_group, criterion_main, Criterion, black_box};
use royal100::board::{Position, START_FEN};

const MIDGAME: &str =
    "rnbskqtbnr/ppp1pppppp/55/3p6/55/4P5/55/2N7/PPPP1PPPPP/R1BSKQTBNR w KQkq Ss - 1 5";

fn bench_parse(c: &mut Criterion) {
    c.bench_function("fen_parse_startpos", |ben| {
        ben.iter(|| {
            let p = Position::from_fen(black_box(START_FEN)).unwrap();
            black_box(p)
        })
    });
    c.bench_function("fen_parse_midgame", |ben| {
        ben.iter(|| {
            let p = Position::from_fen(black_box(MIDGAME)).unwrap();
            black_box(p)
        })
    });
}

fn bench_emit(c: &mut Criterion) {
    let start = Position::start();
    c.bench_function("fen_emit_startpos", |ben| {
        ben.iter(|| {
            let s = black_box(&start).to_fen();
            black_box(s)
        })
    });
}

criterion_group!(benches, bench_parse, bench_emit);
criterion_main!(benches);
