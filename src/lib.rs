//! Client for the IMified instant-messaging bot API.
//!
//! ```no_run
//! use imified::{BotClient, Config, Recipient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BotClient::new(Config::load()?)?;
//! client.send_message("Deploy finished", Some(&Recipient::from("a1b2c3"))).await?;
//! let users = client.get_all_users(Some("Jabber")).await?;
//! println!("{} users", users.count);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod response;

pub use client::BotClient;
pub use config::Config;
pub use error::{ClientError, ConfigError};
pub use models::{ApiMethod, Network, Recipient, SendResult, UserList, UserRecord};
