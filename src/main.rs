use flexi_logger::Logger;
use mini_threes::engine as GameEngine;
use mini_threes::engine::face_value;
use mini_threes::play::play;
use mini_threes::solver::Solver;

fn main() -> anyhow::Result<()> {
    Logger::try_with_env_or_str("info")?
        .format(flexi_logger::colored_default_format)
        .start()?;

    GameEngine::new();
    let mut solver = Solver::new();
    solver.initialize();
    let cfg = solver.config().bag;

    let mut rng = rand::thread_rng();
    let game = play(solver.tables(), &cfg, &mut rng)?;
    println!("{}", game.start.board);
    println!("next: +{}", face_value(game.start.hint));
    for (dir, board) in &game.steps {
        println!("{}", dir);
        println!("{}", board);
    }

    let answer = match game.start_answer {
        Some(a) => a.to_string(),
        None => String::from("unsolved"),
    };
    println!(
        "Moves made: {}, Final score: {}, Start answer (min avg max): {}, States solved: {}",
        game.steps.len(),
        game.final_score(),
        answer,
        solver.tables().before_len() + solver.tables().after_len()
    );
    Ok(())
}
