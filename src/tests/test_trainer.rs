use ndarray::Array1;
use crate::agent::{Agent, DqnAgentBuilder};
use crate::env::{Environment, StepOutcome};
use crate::error::{DqnError, Result};
use crate::trainer::{
    evaluate, EpsilonSchedule, ScoreWindow, SuccessTracker, Trainer, TrainerConfig, SCORE_WINDOW,
};

/// Scripted environment: every step pays `reward`, episodes end after
/// `episode_len` steps (never, when `None`).
struct StubEnv {
    state_size: usize,
    action_size: usize,
    episode_len: Option<usize>,
    reward: f32,
    t: usize,
    resets: usize,
    steps: usize,
    closed: usize,
    fail_on_step: Option<usize>,
}

impl StubEnv {
    fn new(episode_len: Option<usize>, reward: f32) -> Self {
        StubEnv {
            state_size: 4,
            action_size: 3,
            episode_len,
            reward,
            t: 0,
            resets: 0,
            steps: 0,
            closed: 0,
            fail_on_step: None,
        }
    }

    fn observation(&self) -> Array1<f32> {
        Array1::from_elem(self.state_size, self.t as f32 * 0.1)
    }
}

impl Environment for StubEnv {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn reset(&mut self, _train_mode: bool) -> Result<Array1<f32>> {
        self.t = 0;
        self.resets += 1;
        Ok(self.observation())
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if action >= self.action_size {
            return Err(DqnError::InvalidAction { action, max_actions: self.action_size });
        }
        self.steps += 1;
        if Some(self.steps) == self.fail_on_step {
            return Err(DqnError::Environment("simulator went away".to_string()));
        }
        self.t += 1;
        Ok(StepOutcome {
            next_state: self.observation(),
            reward: self.reward,
            done: self.episode_len.map_or(false, |len| self.t >= len),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

/// Agent that always picks action 0 and records what it is shown
struct RecordingAgent {
    state_size: usize,
    action_size: usize,
    epsilons: Vec<f32>,
    transitions: usize,
    dones: usize,
}

impl Default for RecordingAgent {
    fn default() -> Self {
        RecordingAgent {
            state_size: 4,
            action_size: 3,
            epsilons: Vec::new(),
            transitions: 0,
            dones: 0,
        }
    }
}

impl Agent for RecordingAgent {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn act(&mut self, _state: ndarray::ArrayView1<f32>, epsilon: f32) -> Result<usize> {
        self.epsilons.push(epsilon);
        Ok(0)
    }

    fn step(
        &mut self,
        _state: ndarray::ArrayView1<f32>,
        _action: usize,
        _reward: f32,
        _next_state: ndarray::ArrayView1<f32>,
        done: bool,
    ) -> Result<()> {
        self.transitions += 1;
        if done {
            self.dones += 1;
        }
        Ok(())
    }
}

fn config(n_episodes: usize, max_t: usize, threshold: f32) -> TrainerConfig {
    TrainerConfig {
        n_episodes,
        max_t,
        success_threshold: threshold,
        ..TrainerConfig::default()
    }
}

#[test]
fn test_epsilon_schedule_decays_to_floor() {
    let mut schedule = EpsilonSchedule::new(1.0, 0.1, 0.5).unwrap();
    assert_eq!(schedule.epsilon(), 1.0);
    assert_eq!(schedule.advance(), 0.5);
    assert_eq!(schedule.advance(), 0.25);
    assert!((schedule.advance() - 0.125).abs() < 1e-7);
    assert_eq!(schedule.advance(), 0.1);
    assert_eq!(schedule.advance(), 0.1);
}

#[test]
fn test_epsilon_schedule_validation() {
    assert!(EpsilonSchedule::new(0.5, 0.6, 0.9).is_err());
    assert!(EpsilonSchedule::new(1.5, 0.1, 0.9).is_err());
    assert!(EpsilonSchedule::new(1.0, 0.1, 0.0).is_err());
    assert!(EpsilonSchedule::new(1.0, 0.1, 1.5).is_err());
    assert!(EpsilonSchedule::new(1.0, 1.0, 1.0).is_ok());
}

#[test]
fn test_score_window_is_capped() {
    let mut window = ScoreWindow::new(SCORE_WINDOW);
    for i in 0..250 {
        window.push(i as f32);
    }
    assert_eq!(window.len(), 100);
    // mean of 150..250
    assert!((window.mean() - 199.5).abs() < 1e-3);
    assert_eq!(ScoreWindow::new(3).mean(), 0.0);
}

#[test]
fn test_success_tracker_fires_once() {
    let mut tracker = SuccessTracker::new(13.0);
    assert!(!tracker.observe(1, 12.9));
    assert!(tracker.observe(2, 13.0));
    assert!(!tracker.observe(3, 14.0));
    assert!(!tracker.observe(4, 1.0));
    assert_eq!(tracker.solved_episode(), Some(2));
}

#[test]
fn test_solved_flag_survives_drop_in_average() {
    let mut trainer = Trainer::new(config(10, 10, 13.0)).unwrap();
    let first = trainer.end_episode(20.0);
    assert!(first.newly_solved);
    assert_eq!(first.episode, 1);

    for _ in 0..5 {
        let summary = trainer.end_episode(0.0);
        assert!(!summary.newly_solved);
        assert!(summary.running_mean < 13.0);
    }
    assert!(trainer.solved());
}

#[test]
fn test_end_episode_bookkeeping() {
    let mut trainer = Trainer::new(TrainerConfig {
        eps_start: 1.0,
        eps_end: 0.01,
        eps_decay: 0.5,
        ..config(10, 10, 100.0)
    })
    .unwrap();

    let summary = trainer.end_episode(4.0);
    assert_eq!(summary.epsilon, 0.5);
    assert_eq!(trainer.epsilon(), 0.5);
    let summary = trainer.end_episode(2.0);
    assert_eq!(summary.running_mean, 3.0);
    assert_eq!(trainer.scores(), &[4.0, 2.0]);
    assert_eq!(trainer.window().len(), 2);
}

#[test]
fn test_run_stops_on_done() {
    let mut env = StubEnv::new(Some(3), 1.0);
    let mut agent = RecordingAgent::default();
    let mut trainer = Trainer::new(config(4, 100, 50.0)).unwrap();

    let outcome = trainer.run(&mut agent, &mut env).unwrap();
    assert_eq!(outcome.scores, vec![3.0; 4]);
    assert_eq!(outcome.total_steps, 12);
    assert_eq!(outcome.solved_episode, None);
    assert_eq!(agent.transitions, 12);
    assert_eq!(agent.dones, 4);
    assert_eq!(env.resets, 4);
    assert_eq!(env.closed, 1);
}

#[test]
fn test_run_truncates_at_max_t() {
    let mut env = StubEnv::new(None, 0.5);
    let mut agent = RecordingAgent::default();
    let mut trainer = Trainer::new(config(2, 7, 50.0)).unwrap();

    let outcome = trainer.run(&mut agent, &mut env).unwrap();
    assert_eq!(outcome.scores, vec![3.5, 3.5]);
    assert_eq!(agent.transitions, 14);
    assert_eq!(agent.dones, 0);
}

#[test]
fn test_epsilon_is_constant_within_episode() {
    let mut env = StubEnv::new(Some(2), 0.0);
    let mut agent = RecordingAgent::default();
    let mut trainer = Trainer::new(TrainerConfig {
        eps_start: 1.0,
        eps_end: 0.2,
        eps_decay: 0.5,
        ..config(4, 10, 50.0)
    })
    .unwrap();

    let outcome = trainer.run(&mut agent, &mut env).unwrap();
    assert_eq!(agent.epsilons, vec![1.0, 1.0, 0.5, 0.5, 0.25, 0.25, 0.2, 0.2]);
    assert_eq!(outcome.final_epsilon, 0.2);
}

#[test]
fn test_zero_episodes() {
    let mut env = StubEnv::new(Some(1), 1.0);
    let mut agent = RecordingAgent::default();
    let mut trainer = Trainer::new(config(0, 10, 0.0)).unwrap();

    let outcome = trainer.run(&mut agent, &mut env).unwrap();
    assert!(outcome.scores.is_empty());
    assert_eq!(outcome.solved_episode, None);
    assert_eq!(env.resets, 0);
    assert_eq!(env.closed, 1);
}

#[test]
fn test_environment_failure_still_closes() {
    let mut env = StubEnv::new(Some(5), 1.0);
    env.fail_on_step = Some(7);
    let mut agent = RecordingAgent::default();
    let mut trainer = Trainer::new(config(3, 10, 50.0)).unwrap();

    let result = trainer.run(&mut agent, &mut env);
    assert!(matches!(result, Err(DqnError::Environment(_))));
    assert_eq!(env.closed, 1);
    assert_eq!(trainer.scores(), &[5.0]);
}

#[test]
fn test_run_rejects_agent_with_fewer_actions() {
    let mut env = StubEnv::new(Some(3), 1.0);
    let mut agent = DqnAgentBuilder::new()
        .state_size(4)
        .action_size(2)
        .hidden_widths(&[8])
        .seed(11)
        .build()
        .unwrap();
    let mut trainer = Trainer::new(config(200, 10, 50.0)).unwrap();

    let result = trainer.run(&mut agent, &mut env);
    assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));
    assert_eq!(env.resets, 0);
    assert_eq!(env.steps, 0);
    assert_eq!(env.closed, 1);
    assert!(trainer.scores().is_empty());
}

#[test]
fn test_run_rejects_agent_with_wrong_state_width() {
    let mut env = StubEnv::new(Some(3), 1.0);
    let mut agent = RecordingAgent { state_size: 5, ..RecordingAgent::default() };
    let mut trainer = Trainer::new(config(2, 10, 50.0)).unwrap();

    assert!(trainer.run(&mut agent, &mut env).is_err());
    assert_eq!(env.resets, 0);
    assert!(agent.epsilons.is_empty());
    assert_eq!(env.closed, 1);
}

#[test]
fn test_run_with_dqn_agent() {
    let mut env = StubEnv::new(Some(10), 1.0);
    let mut agent = DqnAgentBuilder::new()
        .state_size(4)
        .action_size(3)
        .hidden_widths(&[8, 8])
        .batch_size(8)
        .seed(3)
        .build()
        .unwrap();
    let mut trainer = Trainer::new(config(5, 20, 9.5)).unwrap();

    let outcome = trainer.run(&mut agent, &mut env).unwrap();
    assert_eq!(outcome.scores, vec![10.0; 5]);
    assert_eq!(outcome.solved_episode, Some(1));
    assert_eq!(agent.memory().len(), 50);
    // update points at t = 8, 12, ..., 48
    assert_eq!(agent.learn_steps(), 11);
}

#[test]
fn test_evaluate_greedy_episodes() {
    let mut env = StubEnv::new(Some(4), 2.0);
    let agent = DqnAgentBuilder::new()
        .state_size(4)
        .action_size(3)
        .seed(5)
        .build()
        .unwrap();
    let mut network = agent.local.clone();

    let scores = evaluate(&mut network, &mut env, 3, 100).unwrap();
    assert_eq!(scores, vec![8.0; 3]);
    assert_eq!(env.closed, 1);
}

#[test]
fn test_evaluate_rejects_mismatched_network() {
    let mut env = StubEnv::new(Some(4), 2.0);
    env.state_size = 6;
    let agent = DqnAgentBuilder::new().state_size(4).action_size(3).seed(5).build().unwrap();
    let mut network = agent.local.clone();

    assert!(evaluate(&mut network, &mut env, 1, 10).is_err());
    assert_eq!(env.closed, 1);
}

#[test]
fn test_invalid_trainer_config() {
    assert!(Trainer::new(config(10, 0, 13.0)).is_err());
    assert!(Trainer::new(TrainerConfig { eps_decay: 0.0, ..TrainerConfig::default() }).is_err());
    assert!(Trainer::new(config(10, 10, f32::NAN)).is_err());
}
