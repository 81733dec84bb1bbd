use anyhow::Result;
use txflow::FlowRegistry;

pub fn users(registry: &FlowRegistry) -> Result<()> {
    let users = registry.users();

    if users.is_empty() {
        println!("No stored flows");
        return Ok(());
    }

    for (i, user) in users.iter().enumerate() {
        let flows = registry.get_user_flows(user);
        println!("{i}: {user} {} flows", flows.len());
    }

    Ok(())
}
