use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Args;
use txflow::{BridgeStatus, FlowRegistry, UserId};
use uuid::Uuid;

#[derive(Args)]
pub struct BridgeStatusSubCommand {
    /// User address
    #[arg(short, long)]
    user: String,
    /// Flow id
    #[arg(short, long)]
    flow: Uuid,
    /// Transaction index in the flow
    #[arg(short, long)]
    index: usize,
    /// New status: pending, completed or failed
    #[arg(short, long)]
    status: String,
}

pub async fn bridge_status(
    registry: &FlowRegistry,
    sub_command_args: &BridgeStatusSubCommand,
) -> Result<()> {
    let user = UserId::from(sub_command_args.user.as_str());
    let status = BridgeStatus::from_str(&sub_command_args.status).map_err(|err| anyhow!(err))?;

    registry
        .set_bridge_status(
            &user,
            sub_command_args.flow,
            sub_command_args.index,
            status,
        )
        .await?;

    println!(
        "Transaction {} of {} is now {status}",
        sub_command_args.index, sub_command_args.flow
    );

    Ok(())
}
