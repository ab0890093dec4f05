use clap::{Parser, Subcommand};
use colored::Colorize;
use klondike_solvability::codec::{decode_game_code, encode_game_code};
use klondike_solvability::moves::apply_move_in_place;
use klondike_solvability::rng::random_seed;
use klondike_solvability::solver::analyze_seeds;
use klondike_solvability::{
    GameEngine, GameState, RecycleMode, Ruleset, SolverLimits, SolverResult, Strategy,
};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "klondike", about = "Deal, share and solve Klondike games")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Turn three cards per draw.
    #[arg(long, global = true)]
    draw3: bool,
    /// Recycles allowed through the stock, -1 for unlimited.
    #[arg(long, global = true, default_value_t = -1, allow_negative_numbers = true)]
    redeals: i32,
    /// Recycle the waste in reverse order.
    #[arg(long, global = true)]
    reverse: bool,
    /// Forbid moving cards back off the foundations.
    #[arg(long, global = true)]
    no_f2t: bool,
    #[arg(long, global = true, default_value_t = 200_000)]
    max_states: usize,
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board for a seed, or for a random one.
    Deal { seed: Option<u64> },
    /// Search for a winning line.
    Solve {
        seed: u64,
        #[arg(default_value = "astar")]
        strategy: String,
    },
    /// Solve a range of seeds in parallel.
    Batch { start: u64, count: u64 },
    /// Print the shareable code for a seed, or decode one.
    Code { seed_or_code: String },
}

impl Cli {
    fn rules(&self) -> Ruleset {
        let draw = if self.draw3 { Ruleset::draw_three() } else { Ruleset::default() };
        draw.with_redeals(self.redeals)
            .with_recycle(if self.reverse { RecycleMode::Reverse } else { RecycleMode::Keep })
            .with_foundation_to_tableau(!self.no_f2t)
    }

    fn limits(&self) -> SolverLimits {
        SolverLimits::default()
            .with_max_states(self.max_states)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn print_result(start: &GameState, result: &SolverResult) {
    match result {
        SolverResult::Success { moves, states_explored } => {
            println!(
                "{} in {} moves ({} states)",
                result.label().green().bold(),
                moves.len(),
                states_explored
            );
            let mut state = start.clone();
            for (i, mv) in moves.iter().enumerate() {
                println!("{:>4}. {}", i + 1, mv.pretty_string(&state));
                apply_move_in_place(&mut state, mv);
            }
        }
        SolverResult::InherentlyUnsolvable { reason } => {
            println!("{}: {}", result.label().red().bold(), reason)
        }
        SolverResult::Unsolvable { states_explored }
        | SolverResult::Timeout { states_explored }
        | SolverResult::TooComplex { states_explored } => {
            println!("{} ({} states)", result.label().yellow().bold(), states_explored)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let rules = cli.rules();

    match &cli.command {
        Command::Deal { seed } => {
            let seed = seed.unwrap_or_else(random_seed);
            let mut engine = GameEngine::new();
            engine.start_game(seed, rules);
            println!("Deal {} (seed {})", engine.deal_id().unwrap_or_default().bold(), seed);
            println!("{}", engine.state());
            if let Some(reason) = engine.inherent_unsolvability() {
                println!("{} {}", "unwinnable:".red(), reason);
            }
        }
        Command::Solve { seed, strategy } => {
            let Some(strategy) = Strategy::parse(strategy) else {
                eprintln!("unknown strategy `{}`, expected bfs or astar", strategy);
                return ExitCode::FAILURE;
            };
            let mut engine = GameEngine::new();
            engine.start_game(*seed, rules);
            println!("{}", engine.state());
            print_result(engine.state(), &engine.solve(strategy, &cli.limits()));
        }
        Command::Batch { start, count } => {
            let seeds: Vec<u64> = (*start..start.saturating_add(*count)).collect();
            let reports = analyze_seeds(&seeds, rules, Strategy::AStar, &cli.limits());
            let solved = reports.iter().filter(|report| report.result.is_success()).count();
            for report in &reports {
                println!("{:>20}  {}  {}", report.seed, report.deal_id, report.result.label());
            }
            println!("{}/{} solved", solved, reports.len());
        }
        Command::Code { seed_or_code } => match seed_or_code.parse::<u64>() {
            Ok(seed) => println!("{}", encode_game_code(seed, &rules)),
            Err(_) => match decode_game_code(seed_or_code) {
                Ok((seed, rules)) => println!("seed {} rules {:?}", seed, rules),
                Err(err) => {
                    eprintln!("{}", err);
                    return ExitCode::FAILURE;
                }
            },
        },
    }
    ExitCode::SUCCESS
}
