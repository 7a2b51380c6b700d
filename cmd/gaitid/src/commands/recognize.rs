//! Match command.

use clap::Args;

use giztoy_gaitid::MatchResponse;

use super::{load_vector, output_result, print_verbose, with_services};
use crate::Cli;

/// Identify an embedding against the gallery.
///
/// Prints the closest identity if its similarity reaches the threshold,
/// otherwise reports the subject as unrecognized.
#[derive(Args)]
pub struct MatchCommand {
    /// Query embedding file (JSON or YAML list of numbers)
    #[arg(long)]
    vector: String,

    /// Override the configured threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Echo the query embedding in the response
    #[arg(long)]
    with_embedding: bool,
}

impl MatchCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let query = load_vector(&self.vector)?;
        let threshold = self.threshold;
        let with_embedding = self.with_embedding;

        let response = with_services(cli, move |s| {
            let threshold = threshold.unwrap_or(s.engine.threshold());
            let result = s.engine.match_query(&query, threshold)?;
            Ok(MatchResponse::new(result, with_embedding.then_some(query)))
        })
        .await?;

        print_verbose(
            cli,
            &format!(
                "recognized={} similarity={:.4}",
                response.recognized, response.similarity
            ),
        );
        output_result(&response, cli.output.as_deref(), cli.json)
    }
}
