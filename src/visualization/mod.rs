pub mod export;
pub mod plot;
pub mod text_plots;

pub use export::{export_scores_csv, write_scores_csv};
pub use plot::{render_scores, save_score_plot, PlotOptions};
pub use text_plots::{plot_series, scores_summary, training_progress};
