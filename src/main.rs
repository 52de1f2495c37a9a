use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use clientca::config::Settings;
use clientca::secret::SecretClient;
use clientca::service::{IssuanceRequest, KeyStoreService};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "clientca")]
#[command(version, about = "Issue and use mutual-TLS client certificates", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        env = "CLIENTCA_CONFIG",
        default_value = "clientca.toml",
        help = "Settings file"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Issue a client certificate and store it as a PKCS#12 container")]
    Issue(IssueArgs),

    #[command(about = "Store an existing PKCS#12 container")]
    Upload {
        #[arg(help = "Container file")]
        file: PathBuf,

        #[arg(short, long, help = "Container password")]
        password: String,

        #[arg(short, long, help = "Alias of the certificate entry")]
        alias: String,
    },

    #[command(about = "Write a stored container to a .p12 file")]
    Download {
        id: Uuid,

        #[arg(short, long, help = "Output file (default: <id>.p12)")]
        out: Option<PathBuf>,
    },

    #[command(about = "Delete a stored container and its record")]
    Delete { id: Uuid },

    #[command(about = "List stored containers, newest first")]
    List,

    #[command(about = "Call the secret endpoint using a stored container")]
    Secret { id: Uuid },
}

#[derive(Args)]
struct IssueArgs {
    #[arg(long, help = "Common name (CN)")]
    cn: Option<String>,

    #[arg(short = 'L', long, help = "Locality or city (L)")]
    locality: Option<String>,

    #[arg(short = 'S', long, help = "State or province (ST)")]
    state: Option<String>,

    #[arg(short = 'C', long, help = "Country (C)")]
    country: Option<String>,

    #[arg(short, long, help = "Organization (O)")]
    org: Option<String>,

    #[arg(short = 'u', long, help = "Organizational unit (OU)")]
    ou: Option<String>,

    #[arg(short, long, help = "Container password")]
    password: String,

    #[arg(short, long, help = "Alias of the key entry")]
    alias: String,
}

impl From<IssueArgs> for IssuanceRequest {
    fn from(args: IssueArgs) -> Self {
        IssuanceRequest {
            common_name: args.cn,
            locality: args.locality,
            state: args.state,
            country: args.country,
            organization: args.org,
            organizational_unit: args.ou,
            password: args.password,
            alias: args.alias,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let service = KeyStoreService::from_settings(&settings)?;

    match cli.command {
        Commands::Issue(args) => {
            let record = service.issue(&args.into())?;
            println!("{}", record.id);
        }
        Commands::Upload {
            file,
            password,
            alias,
        } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let record = service.upload(&bytes, &password, &alias)?;
            println!("{}", record.id);
        }
        Commands::Download { id, out } => {
            let record = service.get(id)?;
            let bytes = service.download(id)?;
            let out = out.unwrap_or_else(|| PathBuf::from(record.container_file_name()));
            std::fs::write(&out, bytes).with_context(|| format!("writing {}", out.display()))?;
            println!("{}", out.display());
        }
        Commands::Delete { id } => {
            service.delete(id)?;
        }
        Commands::List => {
            for record in service.list()? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id, record.alias, record.subject_dn, record.not_before, record.not_after
                );
            }
        }
        Commands::Secret { id } => {
            let client = SecretClient::from_service(&service, settings.secret_url.clone())?;
            print!("{}", client.fetch_secret(id)?);
        }
    }
    Ok(())
}
