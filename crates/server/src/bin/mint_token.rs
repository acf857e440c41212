//! Mint a development access token signed with `KANBAN_JWT_SECRET`.
//!
//! ```text
//! mint_token --email ada@example.com [--name "Ada"] [--user-id <uuid>] [--hours 12]
//! ```

use anyhow::{Context, bail};
use services::services::{auth::JwtService, config::ServerConfig};
use uuid::Uuid;

struct Args {
    email: String,
    name: Option<String>,
    user_id: Option<Uuid>,
    hours: i64,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut email = None;
        let mut name = None;
        let mut user_id = None;
        let mut hours = 12;

        while let Some(flag) = args.next() {
            let mut value = || args.next().with_context(|| format!("{flag} needs a value"));
            match flag.as_str() {
                "--email" => email = Some(value()?),
                "--name" => name = Some(value()?),
                "--user-id" => {
                    user_id = Some(value()?.parse::<Uuid>().context("--user-id must be a UUID")?)
                }
                "--hours" => hours = value()?.parse::<i64>().context("--hours must be a number")?,
                other => bail!("unknown argument '{other}'"),
            }
        }

        Ok(Args {
            email: email.context("--email is required")?,
            name,
            user_id,
            hours,
        })
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse()?;
    let config = ServerConfig::from_env()?;

    let jwt = JwtService::new(config.jwt_secret, config.token_audience);
    let user_id = args.user_id.unwrap_or_else(Uuid::new_v4);
    let name = args.name.unwrap_or_else(|| args.email.clone());
    let token = jwt.mint(user_id, &args.email, &name, chrono::Duration::hours(args.hours))?;

    eprintln!("user_id: {user_id}");
    println!("{token}");
    Ok(())
}
