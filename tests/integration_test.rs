use banana_dqn::{
    agent::{DqnAgent, DqnAgentBuilder},
    config::Config,
    env::{Environment, ProcessEnvironment, StepOutcome},
    error::Result,
    layers::Mode,
    metrics::ScoreCurves,
    network::QNetwork,
    trainer::{Trainer, TrainerConfig, SCORE_WINDOW},
    visualization::{export_scores_csv, save_score_plot},
};
use ndarray::{array, Array1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

/// 4-dimensional observations, 3 actions, reward 1 and episode end on the
/// first step
struct OneStepEnv {
    closed: bool,
}

impl Environment for OneStepEnv {
    fn state_size(&self) -> usize {
        4
    }

    fn action_size(&self) -> usize {
        3
    }

    fn reset(&mut self, _train_mode: bool) -> Result<Array1<f32>> {
        Ok(array![0.1, 0.2, 0.3, 0.4])
    }

    fn step(&mut self, _action: usize) -> Result<StepOutcome> {
        Ok(StepOutcome {
            next_state: array![0.0, 0.0, 0.0, 0.0],
            reward: 1.0,
            done: true,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn one_step_agent(seed: u64) -> DqnAgent {
    DqnAgentBuilder::new()
        .state_size(4)
        .action_size(3)
        .hidden_widths(&[16, 16])
        .batch_size(2)
        .update_every(1)
        .seed(seed)
        .build()
        .unwrap()
}

fn trainer(threshold: f32) -> Trainer {
    Trainer::new(TrainerConfig {
        n_episodes: 5,
        max_t: 10,
        success_threshold: threshold,
        ..TrainerConfig::default()
    })
    .unwrap()
}

#[test]
fn test_end_to_end_training() {
    let mut env = OneStepEnv { closed: false };
    let mut agent = one_step_agent(42);

    let outcome = trainer(13.0).run(&mut agent, &mut env).unwrap();
    assert_eq!(outcome.scores.len(), 5);
    assert!(outcome.scores.iter().all(|&s| s == 1.0));
    assert_eq!(outcome.solved_episode, None);
    assert!(env.closed);

    // 5 transitions, learning from the second one on
    assert_eq!(agent.memory().len(), 5);
    assert_eq!(agent.learn_steps(), 4);
}

#[test]
fn test_solved_when_threshold_reachable() {
    let mut env = OneStepEnv { closed: false };
    let mut agent = one_step_agent(7);

    let outcome = trainer(1.0).run(&mut agent, &mut env).unwrap();
    assert_eq!(outcome.scores, vec![1.0; 5]);
    assert_eq!(outcome.solved_episode, Some(1));
}

#[test]
fn test_deterministic_runs_match() {
    let run = || {
        let mut env = OneStepEnv { closed: false };
        let mut agent = one_step_agent(42);
        trainer(13.0).run(&mut agent, &mut env).unwrap();
        agent.local.snapshot().tensors
    };
    assert_eq!(run(), run());
}

#[test]
fn test_artifacts_round_trip() {
    let dir = tempdir().unwrap();
    let mut env = OneStepEnv { closed: false };
    let mut agent = one_step_agent(1);
    let outcome = trainer(13.0).run(&mut agent, &mut env).unwrap();

    let model = dir.path().join("model.bin");
    agent.save(&model).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut loaded = QNetwork::load(&model, &mut rng).unwrap();
    let state = array![0.1, 0.2, 0.3, 0.4];
    assert_eq!(
        loaded.forward(state.view(), Mode::Eval).unwrap(),
        agent.local.forward(state.view(), Mode::Eval).unwrap()
    );

    let curves = ScoreCurves::new(&outcome.scores, SCORE_WINDOW);
    let plot = dir.path().join("training_scores.png");
    save_score_plot(&curves, 13.0, &plot).unwrap();
    assert!(std::fs::metadata(&plot).unwrap().len() > 0);

    let csv = dir.path().join("training_scores.csv");
    export_scores_csv(&curves, &csv).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 6);

    let config_path = dir.path().join("config.json");
    let config = Config { n_episodes: 5, deterministic: true, ..Config::default() };
    config.save_json(&config_path).unwrap();
    assert_eq!(Config::from_json_file(&config_path).unwrap(), config);
}

#[cfg(unix)]
mod process {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const SIMULATOR: &str = r#"#!/bin/sh
echo '{"state_size":2,"action_size":2,"num_agents":1}'
t=0
while read -r line; do
  case "$line" in
    *reset*) t=0; echo '{"observation":[0.0,0.0]}' ;;
    *step*)
      t=$((t+1))
      if [ "$t" -ge 3 ]; then fin=true; else fin=false; fi
      echo "{\"observation\":[0.5,0.5],\"reward\":1.0,\"done\":$fin}" ;;
    *close*) exit 0 ;;
  esac
done
"#;

    fn write_simulator(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("simulator.sh");
        std::fs::write(&path, SIMULATOR).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_process_environment_protocol() {
        let dir = tempdir().unwrap();
        let path = write_simulator(dir.path());

        let mut env = ProcessEnvironment::spawn(&path, true).unwrap();
        assert_eq!(env.state_size(), 2);
        assert_eq!(env.action_size(), 2);
        assert_eq!(env.handshake().num_agents, 1);

        assert_eq!(env.reset(true).unwrap(), array![0.0, 0.0]);
        let mut steps = 0;
        loop {
            let outcome = env.step(1).unwrap();
            steps += 1;
            assert_eq!(outcome.reward, 1.0);
            if outcome.done {
                break;
            }
        }
        assert_eq!(steps, 3);
        assert!(env.step(2).is_err());

        env.close().unwrap();
        env.close().unwrap();
    }

    #[test]
    fn test_training_against_process() {
        let dir = tempdir().unwrap();
        let path = write_simulator(dir.path());

        let mut env = ProcessEnvironment::spawn(&path, false).unwrap();
        let mut agent = DqnAgentBuilder::new()
            .state_size(2)
            .action_size(2)
            .hidden_widths(&[8])
            .batch_size(4)
            .seed(9)
            .build()
            .unwrap();
        let mut trainer = Trainer::new(TrainerConfig {
            n_episodes: 4,
            max_t: 100,
            success_threshold: 3.0,
            ..TrainerConfig::default()
        })
        .unwrap();

        let outcome = trainer.run(&mut agent, &mut env).unwrap();
        assert_eq!(outcome.scores, vec![3.0; 4]);
        assert_eq!(outcome.solved_episode, Some(1));
        assert!(agent.act(array![0.5, 0.5].view(), 0.0).unwrap() < 2);
    }

    #[test]
    fn test_missing_simulator() {
        let result = ProcessEnvironment::spawn("/nonexistent/simulator", true);
        assert!(result.is_err());
    }
}
