use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Error};
use clap::Parser;
use clap_stdin::MaybeStdin;
use mobileid::{
    authentication::{Outcome, SystemClock},
    definitions::x509::{SignatureVerifier, TrustAnchorRegistry},
    transport::{ClientPool, ReqwestTransport},
    Authenticator, Config, MobileIdClient,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Run one authentication against the service and print the outcome.
    Authenticate {
        /// Path to the TOML configuration.
        #[arg(short, long)]
        config: PathBuf,
        /// Phone number of the user.
        phone_number: String,
        /// Serial number registered for the user.
        #[arg(long)]
        serial_number: Option<String>,
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Verify a base64 CMS signature against the data that was to be signed.
    Verify {
        /// Path to the base64 encoded signature.
        signature: PathBuf,
        /// The data to be signed, `-` to read it from stdin.
        data_to_be_signed: MaybeStdin<String>,
        /// PEM file with trusted CA certificates. May be repeated.
        #[arg(long = "trust-anchor")]
        trust_anchors: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().action {
        Action::Authenticate {
            config,
            phone_number,
            serial_number,
            language,
        } => authenticate(config, &phone_number, serial_number.as_deref(), &language),
        Action::Verify {
            signature,
            data_to_be_signed,
            trust_anchors,
        } => {
            let signature = std::fs::read_to_string(&signature)
                .with_context(|| format!("could not read {}", signature.display()))?;
            let signer = verify(&signature, &data_to_be_signed.to_string(), &trust_anchors)?;
            println!("{}", serde_json::to_string_pretty(&signer)?);
            Ok(())
        }
    }
}

fn authenticate(
    config: PathBuf,
    phone_number: &str,
    serial_number: Option<&str>,
    language: &str,
) -> Result<(), Error> {
    let config = Config::load(&config).context("could not load configuration")?;
    let transport_settings = config.transport.clone();
    // Fail early on a broken client identity instead of on the first request.
    ReqwestTransport::new(&transport_settings)?;
    let pool = ClientPool::new(config.session.web_client_max_requests, move || {
        ReqwestTransport::new(&transport_settings)
    });
    let client = MobileIdClient::from_settings(config.client, pool)?;
    let authenticator = Authenticator::new(client, config.session, SystemClock);

    let (mut context, mut outcome) =
        authenticator.begin_attempt(serial_number, phone_number, language);
    while let Outcome::Pending {
        display_text,
        poll_delay_ms,
        ..
    } = &outcome
    {
        eprintln!("{display_text}");
        std::thread::sleep(Duration::from_millis(*poll_delay_ms));
        outcome = authenticator.continue_attempt(&mut context);
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct Signer {
    common_name: String,
    display_name: Option<String>,
    serial_number: Option<String>,
}

fn verify(signature: &str, data_to_be_signed: &str, trust_anchors: &[PathBuf]) -> Result<Signer, Error> {
    let registry = TrustAnchorRegistry::from_pem_files(trust_anchors)?;
    let verifier = SignatureVerifier::new(registry, !trust_anchors.is_empty());
    let compact: String = signature.split_whitespace().collect();
    let data_to_be_signed = data_to_be_signed
        .strip_suffix('\n')
        .map(|dtbs| dtbs.strip_suffix('\r').unwrap_or(dtbs))
        .unwrap_or(data_to_be_signed);
    let message = verifier
        .verify(data_to_be_signed, &compact)
        .context("signature is not valid")?;
    let x5chain = message.x5chain();
    Ok(Signer {
        common_name: x5chain.end_entity_common_name().to_string(),
        display_name: x5chain.end_entity_display_name().map(str::to_string),
        serial_number: x5chain.end_entity_serial_number().map(str::to_string),
    })
}
