//! TinyCert CLI - Manage certificate authorities and certificates from the shell

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tinycert::{
    CaInfo, CaListItem, CertificateAuthorities, CertificateFormat, CertificateInfo,
    CertificateListItem, CertificateStatus, CertificateSubject, Certificates, HashMethod,
    Session, SessionConfig, StatusFilter, SubjectAltName, DEFAULT_SERVER_URL,
};
use tinycert_cli::settings::{Settings, SettingsStore};

/// TinyCert CLI
#[derive(Parser, Debug)]
#[command(name = "tinycert")]
#[command(about = "Manage TinyCert certificate authorities and certificates", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account email (falls back to the saved setting)
    #[arg(long, env = "TINYCERT_EMAIL", global = true)]
    email: Option<String>,

    /// Account passphrase
    #[arg(long, env = "TINYCERT_PASSWORD", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    /// API key used to sign requests
    #[arg(long, env = "TINYCERT_APIKEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API root URL (falls back to the saved setting, then the public service)
    #[arg(long, env = "TINYCERT_SERVER", global = true)]
    server: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Certificate authority operations
    Ca {
        #[command(subcommand)]
        command: CaCommands,
    },
    /// Certificate operations
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },
    /// Saved CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CaCommands {
    /// List certificate authorities
    List,
    /// Create a certificate authority
    Create {
        /// Organization name (O)
        #[arg(long)]
        organization: String,
        /// Locality (L)
        #[arg(long)]
        locality: String,
        /// State or province code (ST)
        #[arg(long)]
        state: String,
        /// Two-letter country code (C)
        #[arg(long)]
        country: String,
        /// Signature hash (sha1, sha256)
        #[arg(long, default_value = "sha256")]
        hash_method: HashMethod,
    },
    /// Show CA subject and settings
    Details {
        /// CA id
        ca_id: i64,
    },
    /// Print the CA certificate as PEM
    Get {
        /// CA id
        ca_id: i64,
    },
    /// Delete a certificate authority
    Delete {
        /// CA id
        ca_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum CertCommands {
    /// Issue a certificate
    Create {
        /// Signing CA id
        #[arg(long)]
        ca_id: i64,
        /// Common name (CN)
        #[arg(long)]
        common_name: String,
        /// Organizational unit (OU)
        #[arg(long, default_value = "")]
        organizational_unit: String,
        /// Organization (O)
        #[arg(long, default_value = "")]
        organization: String,
        /// Locality (L)
        #[arg(long, default_value = "")]
        locality: String,
        /// State or province code (ST)
        #[arg(long, default_value = "")]
        state: String,
        /// Two-letter country code (C)
        #[arg(long, default_value = "")]
        country: String,
        /// Subject alternative name, e.g. dns:www.example.com (repeatable)
        #[arg(long = "san")]
        alt_names: Vec<SubjectAltName>,
    },
    /// Print certificate material
    Get {
        /// Certificate id
        cert_id: i64,
        /// cert, chain, csr, key.dec, key.enc or pkcs12
        #[arg(long, default_value = "cert")]
        format: CertificateFormat,
    },
    /// Show certificate subject and status
    Details {
        /// Certificate id
        cert_id: i64,
    },
    /// List certificates of a CA
    List {
        /// CA id
        ca_id: i64,
        /// Only these statuses (repeatable; default: all)
        #[arg(long = "status")]
        statuses: Vec<CertificateStatus>,
    },
    /// Reissue a certificate with a new key
    Reissue {
        /// Certificate id
        cert_id: i64,
    },
    /// Change the status of a certificate
    SetStatus {
        /// Certificate id
        cert_id: i64,
        /// good, revoked, hold or expired
        status: CertificateStatus,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print saved settings
    Show,
    /// Save the default account email
    SetEmail {
        email: String,
    },
    /// Save the default API root
    SetServer {
        url: String,
    },
    /// Remove all saved settings
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let store = SettingsStore::new()?;

    match cli.command {
        Commands::Config { ref command } => handle_config(&store, command),
        Commands::Ca { ref command } => {
            let mut session = open_session(&cli, &store.load()?)?;
            session
                .with_connection(|session| handle_ca(session, command))
                .context("CA command failed")?
                .print()
        }
        Commands::Cert { ref command } => {
            let mut session = open_session(&cli, &store.load()?)?;
            session
                .with_connection(|session| handle_cert(session, command))
                .context("Certificate command failed")?
                .print()
        }
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Merge flags, environment and saved settings into a session
fn open_session(cli: &Cli, settings: &Settings) -> Result<Session> {
    let email = cli
        .email
        .clone()
        .or_else(|| settings.email.clone())
        .context("No email given (use --email, TINYCERT_EMAIL or `tinycert config set-email`)")?;
    let passphrase = cli
        .passphrase
        .clone()
        .context("No passphrase given (use --passphrase or TINYCERT_PASSWORD)")?;
    let api_key = cli
        .api_key
        .clone()
        .context("No API key given (use --api-key or TINYCERT_APIKEY)")?;
    let server_url = cli
        .server
        .clone()
        .or_else(|| settings.server_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    let config = SessionConfig::builder()
        .email(email)
        .passphrase(passphrase)
        .api_key(api_key)
        .server_url(server_url)
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;
    debug!("Using {:?}", config);

    Ok(Session::new(config)?)
}

/// Result of a remote command, printed once the session is released
enum Output {
    Id(i64),
    Text(String),
    Message(String),
    CaList(Vec<CaListItem>),
    CaInfo(CaInfo),
    CertificateList(Vec<CertificateListItem>),
    CertificateInfo(CertificateInfo),
}

impl Output {
    fn print(&self) -> Result<()> {
        match self {
            Output::Id(id) => println!("{}", id),
            Output::Text(text) => print!("{}", text),
            Output::Message(message) => eprintln!("{}", message),
            Output::CaList(items) => print_json(items)?,
            Output::CaInfo(info) => print_json(info)?,
            Output::CertificateList(items) => print_json(items)?,
            Output::CertificateInfo(info) => print_json(info)?,
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to format output")?
    );
    Ok(())
}

fn handle_ca(session: &Session, command: &CaCommands) -> tinycert::Result<Output> {
    let cas = CertificateAuthorities::new(session);

    let output = match command {
        CaCommands::List => Output::CaList(cas.list()?),
        CaCommands::Create {
            organization,
            locality,
            state,
            country,
            hash_method,
        } => Output::Id(cas.create(organization, locality, state, country, *hash_method)?),
        CaCommands::Details { ca_id } => Output::CaInfo(cas.details(*ca_id)?),
        CaCommands::Get { ca_id } => Output::Text(cas.get(*ca_id)?),
        CaCommands::Delete { ca_id } => {
            cas.delete(*ca_id)?;
            Output::Message(format!("Deleted CA {}", ca_id))
        }
    };

    Ok(output)
}

fn handle_cert(session: &Session, command: &CertCommands) -> tinycert::Result<Output> {
    let certs = Certificates::new(session);

    let output = match command {
        CertCommands::Create {
            ca_id,
            common_name,
            organizational_unit,
            organization,
            locality,
            state,
            country,
            alt_names,
        } => {
            let subject = CertificateSubject::new(common_name.as_str())
                .with_organizational_unit(organizational_unit.as_str())
                .with_organization(organization.as_str())
                .with_locality(locality.as_str())
                .with_state_code(state.as_str())
                .with_country_code(country.as_str());

            Output::Id(certs.create(*ca_id, &subject, alt_names)?)
        }
        CertCommands::Get { cert_id, format } => Output::Text(certs.get(*cert_id, *format)?),
        CertCommands::Details { cert_id } => Output::CertificateInfo(certs.details(*cert_id)?),
        CertCommands::List { ca_id, statuses } => {
            let filter = if statuses.is_empty() {
                StatusFilter::all()
            } else {
                statuses.iter().copied().collect()
            };
            Output::CertificateList(certs.list(*ca_id, filter)?)
        }
        CertCommands::Reissue { cert_id } => Output::Id(certs.reissue(*cert_id)?),
        CertCommands::SetStatus { cert_id, status } => {
            certs.set_status(*cert_id, *status)?;
            Output::Message(format!("Certificate {} is now {}", cert_id, status))
        }
    };

    Ok(output)
}

fn handle_config(store: &SettingsStore, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            eprintln!("({})", store.path().display());
        }
        ConfigCommands::SetEmail { email } => {
            store.set_email(email.clone())?;
            eprintln!("Saved email to {}", store.path().display());
        }
        ConfigCommands::SetServer { url } => {
            store.set_server_url(url.clone())?;
            eprintln!("Saved server to {}", store.path().display());
        }
        ConfigCommands::Clear => {
            store.clear()?;
            eprintln!("Cleared {}", store.path().display());
        }
    }

    Ok(())
}
