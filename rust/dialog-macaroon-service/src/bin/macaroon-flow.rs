//! Runs the macaroon authorization flow end to end in one process.
//!
//! The issuer mints a root macaroon, the client finds the third-party caveat
//! and asks the discharger for a discharge, binds it to the root macaroon,
//! and presents both to the authority.

use anyhow::{Context, Result};
use clap::Parser;
use dialog_macaroon::{Macaroon, encode_bundle};
use dialog_macaroon_service::{
    Authority, DISCHARGE_SECRET_VAR, DischargeRequest, Discharger, Issuer, PermissionRequest,
    ROOT_SECRET_VAR, Settings, StaticAuthenticator,
};
use tracing_subscriber::EnvFilter;

const KNOWN_EMAIL: &str = "me@nope.com";
const KNOWN_PASSWORD: &str = "definitely_not_my_password";

#[derive(Debug, Parser)]
#[command(name = "macaroon-flow")]
#[command(bin_name = "macaroon-flow")]
#[command(about = "Issue, discharge and verify a macaroon", long_about = None)]
struct FlowCli {
    /// Root secret; defaults to $MACAROON_ROOT_SECRET
    #[arg(long)]
    root_secret: Option<String>,

    /// Discharge secret; defaults to $MACAROON_DISCHARGE_SECRET
    #[arg(long)]
    discharge_secret: Option<String>,

    /// Email presented to the discharger
    #[arg(long, default_value = KNOWN_EMAIL)]
    email: String,

    /// Password presented to the discharger
    #[arg(long, default_value = KNOWN_PASSWORD)]
    password: String,

    /// Permissions to request
    #[arg(long = "permission", default_values = ["permission-1", "permission-2"])]
    permissions: Vec<String>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = FlowCli::parse();
    let settings = Settings::from_lookup(|name| {
        let flag = match name {
            ROOT_SECRET_VAR => cli.root_secret.clone(),
            DISCHARGE_SECRET_VAR => cli.discharge_secret.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(name).ok())
    })
    .context("failed to load settings")?;

    let issuer = Issuer::new(settings.issuer());
    let discharger = Discharger::new(
        settings.discharger(),
        StaticAuthenticator::new().with_user(KNOWN_EMAIL, KNOWN_PASSWORD),
    );
    let authority = Authority::new(settings.root_secret.clone());

    // Client: request a root macaroon.
    let request = PermissionRequest::new(cli.permissions);
    let root = Macaroon::from_base64(&issuer.root_macaroon_serialized(&request)?)?;

    // Client: find the caveat addressed to the discharger.
    let caveat = root
        .third_party_caveat_at(&settings.discharger_location)
        .with_context(|| format!("no caveat for {}", settings.discharger_location))?;
    let caveat_id = String::from_utf8(caveat.id().to_vec())?;

    // Client: ask for a discharge and bind it to this root.
    let discharge = discharger
        .discharge_caveat(&DischargeRequest {
            email: cli.email,
            password: cli.password,
            caveat_id,
        })
        .await?;
    let bundle = encode_bundle(&root, &[discharge.bind(root.signature())])?;

    // Issuer: verify what the client presents.
    let authorization = authority.authorize_bundle(&bundle, &request.permissions)?;
    match authorization.email {
        Some(email) => println!("This is the email of the authenticated user: {email}"),
        None => println!("Authorized, but no email was proved"),
    }
    println!("Granted permissions: {}", authorization.permissions.join(", "));
    Ok(())
}
