use crate::metrics::Statistics;

/// Plot a series as ASCII art
pub fn plot_series(values: &[f32], title: &str, width: usize, height: usize) -> String {
    if values.is_empty() || width < 10 || height < 5 {
        return format!("{}: Invalid data or dimensions", title);
    }

    let min_val = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if (max_val - min_val).abs() < f32::EPSILON {
        return format!("{}: All values are {:.4}", title, min_val);
    }

    let mut plot = vec![vec![' '; width]; height];

    for row in plot.iter_mut() {
        row[0] = '|';
    }
    for cell in plot[height - 1].iter_mut() {
        *cell = '-';
    }
    plot[height - 1][0] = '+';

    let x_scale = (values.len().max(2) - 1) as f32 / (width - 3) as f32;
    let y_scale = (height - 3) as f32 / (max_val - min_val);

    for (i, &value) in values.iter().enumerate() {
        let x = ((i as f32 / x_scale) as usize + 2).min(width - 1);
        let offset = ((value - min_val) * y_scale) as usize;
        let y = (height - 3).saturating_sub(offset).min(height - 2);
        plot[y][x] = '*';
    }

    let mut output = format!("{}\n", title);
    output.push_str(&format!("Max: {:.4}\n", max_val));

    for row in plot.iter() {
        output.push_str(&row.iter().collect::<String>());
        output.push('\n');
    }

    output.push_str(&format!("Min: {:.4}\n", min_val));
    output.push_str(&format!("Points: {}\n", values.len()));

    output
}

/// One-line training progress
pub fn training_progress(
    episode: usize,
    total_episodes: usize,
    avg_score: f32,
    epsilon: f32,
) -> String {
    let progress = if total_episodes == 0 {
        1.0
    } else {
        (episode as f32 / total_episodes as f32).min(1.0)
    };
    let bar_length = 30;
    let filled = (progress * bar_length as f32) as usize;
    let bar = format!("[{}{}]", "=".repeat(filled), " ".repeat(bar_length - filled));

    format!(
        "Episode {}/{} {} {:.1}% | Avg Score: {:.2} | ε: {:.4}",
        episode, total_episodes, bar, progress * 100.0, avg_score, epsilon
    )
}

/// Summary table of a run's scores
pub fn scores_summary(scores: &[f32], solved_episode: Option<usize>) -> String {
    let stats = Statistics::from_slice(scores);
    let mut output = String::new();
    output.push_str("Training Scores Summary\n");
    output.push_str("=======================\n");
    output.push_str(&format!("Episodes: {}\n", stats.count));
    if stats.count > 0 {
        output.push_str(&format!(
            "Scores: Mean={:.2}, Median={:.2}, Std={:.2}, Min={:.2}, Max={:.2}\n",
            stats.mean, stats.median, stats.std, stats.min, stats.max
        ));
    }
    match solved_episode {
        Some(episode) => output.push_str(&format!("Solved at episode {}\n", episode)),
        None => output.push_str("Not solved\n"),
    }
    output
}
