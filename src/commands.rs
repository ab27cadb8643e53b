use crate::client::BotClient;
use crate::config::Config;
use crate::models::{Network, Recipient, UserList};
use std::io::Write;

/// Builds the recipient for `send` from command-line options.
///
/// Returns `None` when nothing was given so the configured default applies.
pub fn build_recipient(
    to: &[String],
    user: Option<&str>,
    network: Option<&str>,
) -> anyhow::Result<Option<Recipient>> {
    match (to, user, network) {
        ([], None, None) => Ok(None),
        ([], Some(user), Some(network)) => Ok(Some(Recipient::user_on_network(
            user,
            canonical_network(network),
        ))),
        ([], Some(_), None) => anyhow::bail!("--user requires --network"),
        ([], None, Some(_)) => anyhow::bail!("--network requires --user"),
        ([key], None, None) => Ok(Some(Recipient::SingleKey(key.clone()))),
        (keys, None, None) => Ok(Some(Recipient::KeyList(keys.to_vec()))),
        _ => anyhow::bail!("--to cannot be combined with --user/--network"),
    }
}

/// Known network names are normalised to the API's spelling; others pass through.
pub fn canonical_network(name: &str) -> String {
    match name.parse::<Network>() {
        Ok(network) => network.to_string(),
        Err(_) => {
            tracing::warn!(network = name, "Unknown network, sending as given");
            name.to_string()
        }
    }
}

pub async fn run_send(
    client: &BotClient,
    message: &str,
    recipient: Option<Recipient>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let result = client.send_message(message, recipient.as_ref()).await?;
    if let Some(fault) = result.fault {
        anyhow::bail!("API rejected message: {}", fault.describe());
    }
    if !result.is_ok() {
        anyhow::bail!("API rejected message");
    }
    writeln!(out, "Message sent")?;
    Ok(())
}

pub async fn run_users(
    client: &BotClient,
    network: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let network = network.map(canonical_network);
    let users = client.get_all_users(network.as_deref()).await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&users)?)?;
    } else {
        write_user_table(&users, out)?;
    }
    Ok(())
}

fn write_user_table(users: &UserList, out: &mut impl Write) -> std::io::Result<()> {
    for user in &users.users {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            user.userkey,
            user.network.as_deref().unwrap_or("-"),
            user.screenname.as_deref().unwrap_or("-"),
            user.status.as_deref().unwrap_or("-"),
        )?;
    }
    writeln!(out, "{} user(s)", users.count)
}

pub async fn run_broadcast(
    client: &BotClient,
    message: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    client.send_message_to_all_users(message).await?;
    writeln!(out, "Broadcast sent")?;
    Ok(())
}

/// Prints the configuration, or the value at `key`, with secrets masked.
pub fn run_config(config: &Config, key: Option<&str>, out: &mut impl Write) -> anyhow::Result<()> {
    let shown = Config::new(config.redacted());
    match key {
        None => write!(out, "{}", toml::to_string(shown.values())?)?,
        Some(key) => match shown.get(key) {
            Some(toml::Value::String(s)) => writeln!(out, "{s}")?,
            Some(value) => writeln!(out, "{value}")?,
            None => anyhow::bail!("{key} is not set"),
        },
    }
    Ok(())
}
