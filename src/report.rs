use serde::Serialize;

use graphscribe_core::StatsSnapshot;

/// The single structured outcome of a run, rendered to stdout and logged.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub partial: bool,
    pub cancelled: bool,
    pub graph: String,
    pub elapsed_seconds: f64,
    pub stats: StatsSnapshot,
}

impl RunReport {
    /// Exit code contract: 0 clean success, 2 partial success.
    pub fn exit_code(&self) -> i32 {
        if self.partial {
            2
        } else {
            0
        }
    }

    pub fn print(&self) {
        let s = &self.stats;
        let outcome = match (self.partial, self.cancelled) {
            (false, _) => "complete",
            (true, true) => "partial (cancelled)",
            (true, false) => "partial",
        };
        println!("\n╔══════════════════════════════════════════════╗");
        println!("║           Graphscribe Run Report             ║");
        println!("╠══════════════════════════════════════════════╣");
        println!("║ Outcome:            {:>20}     ║", outcome);
        println!("║ Wall clock (s):     {:>20.1}     ║", self.elapsed_seconds);
        println!("║ Nodes scanned:      {:>20}     ║", s.nodes_scanned);
        println!("║ Videos found:       {:>20}     ║", s.videos_found);
        println!("║ Videos enhanced:    {:>20}     ║", s.videos_enhanced);
        println!("║ Posts found:        {:>20}     ║", s.tweets_found);
        println!("║ Posts enhanced:     {:>20}     ║", s.tweets_enhanced);
        println!("║ PDFs found:         {:>20}     ║", s.pdfs_found);
        println!("║ PDFs enhanced:      {:>20}     ║", s.pdfs_enhanced);
        println!("║ Previews extracted: {:>20}     ║", s.previews_extracted);
        println!("║ Properties stamped: {:>20}     ║", s.properties_stamped);
        println!("║ Topic pages:        {:>20}     ║", s.topic_pages_written);
        println!("║ Jobs submitted:     {:>20}     ║", s.jobs_submitted);
        println!("║ Jobs completed:     {:>20}     ║", s.jobs_completed);
        println!("║ Jobs failed:        {:>20}     ║", s.jobs_failed);
        println!("║ Rate limited:       {:>20}     ║", s.rate_limited);
        println!("║ Retries:            {:>20}     ║", s.retried);
        println!("║ Errors:             {:>20}     ║", s.errors);
        println!("╚══════════════════════════════════════════════╝\n");
    }
}
