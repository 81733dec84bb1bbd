use anyhow::Result;
use clap::Args;
use txflow::{FlowRegistry, UserId};
use uuid::Uuid;

#[derive(Args)]
pub struct ClearSubCommand {
    /// User address
    #[arg(short, long)]
    user: String,
    /// Flow id, all flows of the user when omitted
    #[arg(short, long)]
    flow: Option<Uuid>,
}

pub async fn clear(registry: &FlowRegistry, sub_command_args: &ClearSubCommand) -> Result<()> {
    let user = UserId::from(sub_command_args.user.as_str());

    let removed = registry.clear_flows(&user, sub_command_args.flow).await?;

    println!("Removed {removed} flows for {user}");

    Ok(())
}
