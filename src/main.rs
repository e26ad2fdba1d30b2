use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use banana_dqn::agent::DqnAgent;
use banana_dqn::config::Config;
use banana_dqn::env::{Environment, ProcessEnvironment};
use banana_dqn::metrics::{ScoreCurves, Statistics};
use banana_dqn::network::QNetwork;
use banana_dqn::trainer::{self, Trainer, SCORE_WINDOW};
use banana_dqn::visualization::{export_scores_csv, plot_series, save_score_plot, scores_summary};

const MODEL_FILE: &str = "model.bin";
const PLOT_FILE: &str = "training_scores.png";
const SCORES_FILE: &str = "training_scores.csv";
const CONFIG_FILE: &str = "config.json";

#[derive(Parser)]
#[command(name = "banana-dqn", about = "DQN agent for the banana collector environment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train an agent and write model, plot, scores and config to the output directory
    Train(TrainArgs),
    /// Play greedy episodes with a saved model
    Evaluate(EvaluateArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    env_path: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    no_graphics: bool,
    #[arg(long)]
    success_threshold: Option<f32>,
    #[arg(long)]
    lin_feats: Option<usize>,
    #[arg(long)]
    nb_hidden: Option<usize>,
    /// Batch normalization after each hidden linear layer
    #[arg(long = "bn", alias = "use-normalization", default_value_t = false)]
    use_normalization: bool,
    #[arg(long, alias = "dropout")]
    dropout_prob: Option<f32>,
    #[arg(long)]
    device: Option<String>,
    #[arg(long, default_value_t = false)]
    deterministic: bool,
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,
    #[arg(long)]
    buffer_size: Option<usize>,
    #[arg(long)]
    lr: Option<f32>,
    #[arg(long)]
    episodes: Option<usize>,
    #[arg(long)]
    gamma: Option<f32>,
    #[arg(long)]
    tau: Option<f32>,
    #[arg(long, alias = "update_freq")]
    update_freq: Option<usize>,
    #[arg(long)]
    eps_start: Option<f32>,
    #[arg(long)]
    eps_end: Option<f32>,
    #[arg(long)]
    eps_decay: Option<f32>,
    #[arg(long)]
    max_t: Option<usize>,
}

impl TrainArgs {
    fn resolve(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(v) = self.env_path { config.env_path = v; }
        if let Some(v) = self.output { config.output_dir = v; }
        if self.no_graphics { config.no_graphics = true; }
        if let Some(v) = self.success_threshold { config.success_threshold = v; }
        if let Some(v) = self.lin_feats { config.hidden_width = v; }
        if let Some(v) = self.nb_hidden { config.hidden_count = v; }
        if self.use_normalization { config.use_normalization = true; }
        if let Some(v) = self.dropout_prob { config.dropout_prob = v; }
        if self.device.is_some() { config.device = self.device; }
        if self.deterministic { config.deterministic = true; }
        if let Some(v) = self.batch_size { config.batch_size = v; }
        if let Some(v) = self.buffer_size { config.buffer_size = v; }
        if let Some(v) = self.lr { config.learning_rate = v; }
        if let Some(v) = self.episodes { config.n_episodes = v; }
        if let Some(v) = self.gamma { config.gamma = v; }
        if let Some(v) = self.tau { config.tau = v; }
        if let Some(v) = self.update_freq { config.update_every = v; }
        if let Some(v) = self.eps_start { config.eps_start = v; }
        if let Some(v) = self.eps_end { config.eps_end = v; }
        if let Some(v) = self.eps_decay { config.eps_decay = v; }
        if let Some(v) = self.max_t { config.max_t = v; }

        Ok(config)
    }
}

#[derive(Args)]
struct EvaluateArgs {
    /// Model written by `train`
    #[arg(long)]
    model: PathBuf,
    #[arg(long, default_value = "./Banana_Linux/Banana.x86_64")]
    env_path: PathBuf,
    #[arg(long, default_value_t = false)]
    no_graphics: bool,
    #[arg(long, default_value = "10")]
    episodes: usize,
    #[arg(long, default_value = "1000")]
    max_t: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args.resolve()?),
        Command::Evaluate(args) => evaluate(args),
    }
}

fn rng_for(config: &Config) -> ChaCha8Rng {
    match config.seed() {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn train(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut env = ProcessEnvironment::spawn(&config.env_path, config.no_graphics)
        .with_context(|| format!("Failed to start simulator: {}", config.env_path.display()))?;

    let handshake = env.handshake().clone();
    info!("Number of agents: {}", handshake.num_agents);
    info!("Number of actions: {}", handshake.action_size);
    let state = env.reset(true)?;
    info!("States look like: {}", state);
    info!("States have length: {}", state.len());

    let mut rng = rng_for(&config);
    let network = config.network_config(env.state_size(), env.action_size());
    let mut agent = DqnAgent::new(network, config.agent_config(), &mut rng)?;

    let mut trainer = Trainer::new(config.trainer_config())?;
    let outcome = trainer.run(&mut agent, &mut env).context("Training failed")?;

    let output = &config.output_dir;
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    agent.save(output.join(MODEL_FILE))?;
    config.save_json(output.join(CONFIG_FILE))?;

    let curves = ScoreCurves::new(&outcome.scores, SCORE_WINDOW);
    save_score_plot(&curves, config.success_threshold, output.join(PLOT_FILE))?;
    export_scores_csv(&curves, output.join(SCORES_FILE))?;

    info!("\n{}", scores_summary(&outcome.scores, outcome.solved_episode));
    info!("\n{}", plot_series(&curves.running_mean, "Running average score", 60, 15));
    info!(
        output = %output.display(),
        steps = outcome.total_steps,
        final_epsilon = outcome.final_epsilon,
        "training artifacts written"
    );
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let mut rng = ChaCha8Rng::from_entropy();
    let mut network = QNetwork::load(&args.model, &mut rng)
        .with_context(|| format!("Failed to load model: {}", args.model.display()))?;

    let mut env = ProcessEnvironment::spawn(&args.env_path, args.no_graphics)
        .with_context(|| format!("Failed to start simulator: {}", args.env_path.display()))?;

    let scores = trainer::evaluate(&mut network, &mut env, args.episodes, args.max_t)?;
    let stats = Statistics::from_slice(&scores);
    info!(
        episodes = stats.count,
        mean = stats.mean,
        min = stats.min,
        max = stats.max,
        "evaluation finished"
    );
    Ok(())
}
