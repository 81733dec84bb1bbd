use anyhow::Result;
use clap::Args;
use txflow::{FlowRegistry, FlowTransaction, TransactionFlow, TransactionStatus, UserId};

#[derive(Args)]
pub struct ListSubCommand {
    /// User address
    #[arg(short, long)]
    user: String,
}

pub fn list(registry: &FlowRegistry, sub_command_args: &ListSubCommand) -> Result<()> {
    let user = UserId::from(sub_command_args.user.as_str());
    let flows = registry.get_user_flows(&user);

    if flows.is_empty() {
        println!("No flows for {user}");
        return Ok(());
    }

    for flow in flows.iter() {
        println!("{}", summary(flow));
        for (i, entry) in flow.transactions.iter().enumerate() {
            println!("  {}", transaction_line(i, entry));
        }
    }

    Ok(())
}

/// One line per flow: id, type, status, confirmed transactions and title
pub(crate) fn summary(flow: &TransactionFlow) -> String {
    let confirmed = flow
        .transactions
        .iter()
        .filter(|tx| tx.status() == TransactionStatus::Success)
        .count();

    let mut line = format!(
        "{} {} {} {}/{} {}",
        flow.id,
        flow.tx_type,
        flow.status(),
        confirmed,
        flow.transactions.len(),
        flow.title
    );

    if let Some(error) = flow.error() {
        line.push_str(&format!(" ({error})"));
    }

    line
}

/// Transaction index, status, hash, bridge status and error
pub(crate) fn transaction_line(index: usize, entry: &FlowTransaction) -> String {
    let mut line = format!("{index}: {}", entry.status());

    if let Some(hash) = entry.hash() {
        line.push_str(&format!(" {hash}"));
    }
    if let Some(bridge) = entry.bridge() {
        line.push_str(&format!(
            " bridge {} -> {} {}",
            bridge.source_chain, bridge.dest_chain, bridge.status
        ));
    }
    if let Some(error) = entry.error() {
        line.push_str(&format!(" ({error})"));
    }

    line
}
