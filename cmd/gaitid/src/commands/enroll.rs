//! Enrollment command.

use clap::Args;

use giztoy_gaitid::EnrollmentResponse;

use super::{load_vector, output_result, print_success, with_services};
use crate::Cli;

/// Enroll an identity from an embedding file.
///
/// Re-enrolling an existing identity replaces its reference vector.
#[derive(Args)]
pub struct EnrollCommand {
    /// Identity to enroll
    identity: String,

    /// Embedding file (JSON or YAML list of numbers)
    #[arg(long)]
    vector: String,
}

impl EnrollCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let vector = load_vector(&self.vector)?;
        let identity = self.identity.clone();

        let result = with_services(cli, move |s| {
            Ok(s.enrollment.enroll(&identity, &vector)?)
        })
        .await?;

        let verb = if result.replaced { "re-enrolled" } else { "enrolled" };
        print_success(&format!(
            "{} {} ({} identities)",
            verb, result.identity_id, result.gallery_size
        ));
        output_result(
            &EnrollmentResponse::from(result),
            cli.output.as_deref(),
            cli.json,
        )
    }
}
