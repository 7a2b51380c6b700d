//! Gallery inspection commands.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use giztoy_gallery::Identity;

use super::{output_result, with_services};
use crate::Cli;

#[derive(Serialize)]
struct IdentityInfo {
    identity_id: String,
    dimension: usize,
    enrolled_at: DateTime<Utc>,
    seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
}

impl IdentityInfo {
    fn new(ident: Identity, with_vector: bool) -> Self {
        Self {
            dimension: ident.dim(),
            identity_id: ident.id,
            enrolled_at: ident.enrolled_at,
            seq: ident.seq,
            vector: with_vector.then_some(ident.vector),
        }
    }
}

/// Show one enrolled identity.
#[derive(Args)]
pub struct ShowCommand {
    /// Identity to show
    identity: String,

    /// Include the reference vector
    #[arg(long)]
    with_vector: bool,
}

impl ShowCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let id = self.identity.clone();
        let record = with_services(cli, move |s| Ok(s.enrollment.store().record(&id)?)).await?;

        match record {
            Some(ident) => output_result(
                &IdentityInfo::new(ident, self.with_vector),
                cli.output.as_deref(),
                cli.json,
            ),
            None => anyhow::bail!("identity {:?} is not enrolled", self.identity),
        }
    }
}

/// List enrolled identities in enrollment order.
#[derive(Args)]
pub struct ListCommand {}

#[derive(Serialize)]
struct ListOutput {
    count: usize,
    identities: Vec<IdentityInfo>,
}

impl ListCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut all = with_services(cli, |s| Ok(s.enrollment.store().all()?)).await?;
        all.sort_by(Identity::enrollment_order);

        let identities: Vec<_> = all
            .into_iter()
            .map(|ident| IdentityInfo::new(ident, false))
            .collect();
        let out = ListOutput {
            count: identities.len(),
            identities,
        };
        output_result(&out, cli.output.as_deref(), cli.json)
    }
}
