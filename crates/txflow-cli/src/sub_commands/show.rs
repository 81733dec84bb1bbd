use anyhow::{anyhow, Result};
use clap::Args;
use txflow::{FlowRegistry, UserId};
use uuid::Uuid;

#[derive(Args)]
pub struct ShowSubCommand {
    /// User address
    #[arg(short, long)]
    user: String,
    /// Flow id
    #[arg(short, long)]
    flow: Uuid,
}

pub fn show(registry: &FlowRegistry, sub_command_args: &ShowSubCommand) -> Result<()> {
    let user = UserId::from(sub_command_args.user.as_str());

    let flow = registry
        .get_flow(&user, sub_command_args.flow)
        .ok_or_else(|| anyhow!("Unknown flow {} for {user}", sub_command_args.flow))?;

    println!("{}", serde_json::to_string_pretty(&flow)?);

    Ok(())
}
