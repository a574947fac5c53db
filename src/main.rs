use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use royal100::board::setup::shuffled_start_fen;
use royal100::board::{PieceKind, Position, Side, Square, BOARD_FILES, BOARD_RANKS};
use royal100::engine::proto::Score;
use royal100::engine::transport::ChildSpawner;
use royal100::game::config::{Difficulty, GameConfig, OpponentKind, UndoPolicy, DEPTH_DEFAULT};
use royal100::game::save::SavedGame;
use royal100::game::{GameController, PlayerPrompt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play Royal Chess 100 against a UCI-style engine", long_about = None)]
struct Args {
    /// Path to the engine binary
    #[arg(long)]
    engine: PathBuf,

    /// Extra argument passed to the engine, repeatable
    #[arg(long)]
    engine_arg: Vec<String>,

    /// Your side: 'w' or 'b'
    #[arg(long, default_value = "w")]
    side: String,

    /// Difficulty preset: novice, amateur, master, grandmaster, champion
    #[arg(long)]
    difficulty: Option<String>,

    /// Fixed search depth, overrides the preset
    #[arg(long)]
    depth: Option<u32>,

    /// Engine budget per move in seconds
    #[arg(long)]
    ply_time: Option<u64>,

    /// Clock budget per side in seconds; 0 plays without clocks
    #[arg(long, default_value_t = 600)]
    total_time: u64,

    /// Seconds granted after every move
    #[arg(long, default_value_t = 10)]
    increment: u64,

    /// Undo policy: none, single, full
    #[arg(long, default_value = "single")]
    undo: String,

    /// Two players at one board instead of the engine
    #[arg(long)]
    two_players: bool,

    /// Starting FEN position
    #[arg(long)]
    fen: Option<String>,

    /// Deal the back ranks into a random legal layout
    #[arg(long)]
    shuffle: bool,

    /// Engine strength cap in Elo
    #[arg(long)]
    elo: Option<u32>,

    /// Hide the engine evaluation
    #[arg(long)]
    no_analysis: bool,

    /// Resume from a saved game file
    #[arg(long)]
    load: Option<PathBuf>,

    /// Engine protocol log file (debug builds only)
    #[arg(long)]
    debug_log: Option<PathBuf>,
}

fn parse_side(s: &str) -> Result<Side> {
    match s.to_lowercase().as_str() {
        "w" | "white" => Ok(Side::White),
        "b" | "black" => Ok(Side::Black),
        _ => anyhow::bail!("invalid side: use 'w' or 'b'"),
    }
}

fn parse_difficulty(s: &str) -> Result<Difficulty> {
    match s.to_lowercase().as_str() {
        "novice" => Ok(Difficulty::Novice),
        "amateur" => Ok(Difficulty::Amateur),
        "master" => Ok(Difficulty::Master),
        "grandmaster" => Ok(Difficulty::Grandmaster),
        "champion" => Ok(Difficulty::Champion),
        _ => anyhow::bail!("unknown difficulty: {s}"),
    }
}

fn parse_undo(s: &str) -> Result<UndoPolicy> {
    match s.to_lowercase().as_str() {
        "none" => Ok(UndoPolicy::None),
        "single" => Ok(UndoPolicy::Single),
        "full" => Ok(UndoPolicy::Full),
        _ => anyhow::bail!("unknown undo policy: {s}"),
    }
}

/// Collects promotion and princess decisions on stdin.
struct StdinPrompt;

impl PlayerPrompt for StdinPrompt {
    fn choose_promotion(&mut self, side: Side, choices: &[PieceKind]) -> Option<PieceKind> {
        let letters: String = choices.iter().map(|k| k.letter()).collect();
        loop {
            print!("{side} pawn promotes to [{letters}]: ");
            if io::stdout().flush().is_err() {
                return None;
            }
            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_err() {
                return None;
            }
            let input = input.trim();
            if input.is_empty() {
                return None;
            }
            if let Some(letter) = input.chars().next() {
                if let Some(kind) = PieceKind::from_letter(letter.to_ascii_lowercase()) {
                    if choices.contains(&kind) {
                        return Some(kind);
                    }
                }
            }
            println!("pick one of: {letters}");
        }
    }

    fn confirm_princess_promotion(&mut self, side: Side) -> bool {
        print!("{side} queen has fallen. Promote the princess? [y/N]: ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return false;
        }
        matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn print_board(position: &Position) {
    println!();
    for rank in (0..BOARD_RANKS).rev() {
        print!("{:>2} ", rank + 1);
        for file in 0..BOARD_FILES {
            match position.piece_at(Square::new(file, rank)) {
                Some(piece) => print!(" {}", piece.fen_char()),
                None => print!(" ."),
            }
        }
        println!();
    }
    print!("   ");
    for file in 0..BOARD_FILES {
        print!(" {}", (b'a' + file) as char);
    }
    println!();
}

fn print_status(game: &GameController) {
    if game.clocks().used {
        println!(
            "clocks: white {}  black {}",
            game.clocks().white.format_remaining(),
            game.clocks().black.format_remaining(),
        );
    }
    match game.score() {
        Some(Score::Cp(cp)) => println!("eval: {:+.2}", f64::from(cp) / 100.0),
        Some(Score::Mate(n)) => println!("eval: mate in {n}"),
        None => {}
    }
    if let Some(side) = game.check() {
        println!("{side} is in check");
    }
}

fn print_new_replies(game: &GameController, seen: usize) {
    for record in game.history().iter().skip(seen) {
        if game.config().opponent == OpponentKind::Computer
            && record.side != game.config().my_side
        {
            println!("engine plays: {}", record.raw());
        }
    }
}

const HELP: &str = "\
commands:
  e2e3         play a move
  moves        list squares with a legal move
  moves e2     list destinations for a square
  hint         ask the engine for a suggestion
  undo         take back your last move
  draw         offer the engine a draw
  resign       concede the game
  save <file>  write the game to a file
  fen          print the current position
  quit         leave";

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let my_side = parse_side(&args.side)?;
    let undo = parse_undo(&args.undo)?;
    let depth = match (&args.depth, &args.difficulty) {
        (Some(depth), _) => *depth,
        (None, Some(name)) => parse_difficulty(name)?.depth(),
        (None, None) => DEPTH_DEFAULT,
    };
    let fen = if args.shuffle {
        Some(shuffled_start_fen(&mut SmallRng::from_entropy()))
    } else {
        args.fen.clone()
    };
    let debug_log = if cfg!(debug_assertions) {
        args.debug_log.as_ref().map(|p| p.display().to_string())
    } else {
        None
    };

    let mut spawner = ChildSpawner::new(&args.engine);
    for arg in &args.engine_arg {
        spawner = spawner.arg(arg);
    }

    let mut game = GameController::new(Box::new(spawner), Box::new(StdinPrompt));

    if let Some(path) = &args.load {
        let saved = SavedGame::from_json(&fs::read_to_string(path)?)?;
        game.restore_game(saved)?;
        println!("resumed game from {}", path.display());
    } else {
        let config = GameConfig {
            opponent: if args.two_players { OpponentKind::Human } else { OpponentKind::Computer },
            my_side,
            depth,
            fen,
            total_time: args.total_time,
            ply_increment: args.increment,
            ply_time: args.ply_time,
            undo,
            show_analysis: !args.no_analysis,
            elo: args.elo,
            debug_log,
        };
        game.new_game(config)?;
    }

    println!("{HELP}");
    let mut seen = 0;

    loop {
        game.check_time();
        print_new_replies(&game, seen);
        seen = game.history().len();

        if !game.is_playing() {
            print_board(game.position());
            println!("\n{}", game.state());
            break;
        }

        print_board(game.position());
        print_status(&game);

        print!("{} to move> ", game.turn());
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input.split_whitespace().collect::<Vec<_>>().as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["help"] => println!("{HELP}"),
            ["fen"] => println!("{}", game.fen()),
            ["hint"] => {
                let best = game.hint();
                println!("try {}{}", best.from, best.to);
            }
            ["undo"] => {
                if let Err(e) = game.undo_last() {
                    println!("{e}");
                }
            }
            ["resign"] => game.resign(),
            ["draw"] => {
                if game.offer_draw() {
                    println!("draw agreed");
                } else {
                    println!("draw declined");
                }
            }
            ["save", path] => {
                let saved = game.serialize();
                fs::write(path, saved.to_json()?)?;
                println!("saved to {path}");
            }
            ["moves"] => {
                let origins: Vec<String> =
                    game.valid_moves().origins().map(|sq| sq.to_string()).collect();
                println!("{}", if origins.is_empty() { "none".to_string() } else { origins.join(" ") });
            }
            ["moves", square] => match Square::from_str(square) {
                Ok(sq) => {
                    let dests: Vec<String> =
                        game.valid_moves().destinations(sq).iter().map(|d| d.to_string()).collect();
                    println!("{}", if dests.is_empty() { "none".to_string() } else { dests.join(" ") });
                }
                Err(e) => println!("{e}"),
            },
            [mv] => match parse_move(mv) {
                Ok((from, to)) => {
                    if let Err(e) = game.make_move(from, to) {
                        println!("{e}");
                    }
                }
                Err(e) => println!("{e}"),
            },
            _ => println!("unrecognized command, try 'help'"),
        }
    }

    game.shutdown();
    Ok(())
}

/// Splits a move like `e2e3` or `j10j9` into its two squares.
fn parse_move(s: &str) -> Result<(Square, Square)> {
    let split = s
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i);
    let Some(split) = split else {
        anyhow::bail!("moves look like 'e2e3'");
    };
    let from = Square::from_str(&s[..split]).map_err(|e| anyhow::anyhow!("{e}"))?;
    let to = Square::from_str(&s[split..]).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok((from, to))
}
