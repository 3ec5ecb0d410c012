use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use n4d_client::{Client, ClientConfig, Key, KeyStore, Ticket, Value, DEFAULT_ADDRESS};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "n4d-client")]
#[command(about = "Call methods on an n4d server")]
struct Args {
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Server address
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    address: String,

    /// User name
    #[arg(short, long)]
    user: Option<String>,

    /// Password, asked for when a user has no local key
    #[arg(short, long)]
    password: Option<String>,

    /// User key, or master key when no user is given
    #[arg(short, long)]
    key: Option<String>,

    /// Use the local master key
    #[arg(long, conflicts_with_all = ["user", "key"])]
    master_key: bool,

    /// Ticket string (N4DTKV2 <address> <user> <key>)
    #[arg(short, long, conflicts_with_all = ["user", "password", "key", "master_key"])]
    ticket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the server version
    Version,
    /// List the methods registered on the server
    Methods,
    /// Check the credential against the server
    Validate,
    /// Have the server issue and store a key, then print the ticket
    CreateTicket,
    /// Ask the server for a key and print the ticket
    GetTicket,
    /// Read a variable
    GetVariable {
        name: String,
        /// Include variable metadata
        #[arg(short, long)]
        info: bool,
    },
    /// Write a variable
    SetVariable {
        name:       String,
        /// JSON value
        value:      String,
        /// JSON object with extra information
        extra_info: Option<String>,
    },
    /// Remove a variable
    DeleteVariable { name: String },
    /// Read all variables
    Variables {
        /// Include variable metadata
        #[arg(short, long)]
        full_info: bool,
    },
    /// Call a method of a remote class
    Call {
        class:  String,
        method: String,
        /// JSON arguments
        args:   Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let client = Client::new(client_config(&args)?);
    info!("Using {} as {:?}", client.address(), client.auth_mode());

    match args.command {
        Commands::Version => print_value(&client.version()?)?,
        Commands::Methods => print_value(&client.get_methods()?)?,
        Commands::Validate => print_value(&client.validate_user()?)?,
        Commands::CreateTicket => print_ticket(&client.create_ticket()?)?,
        Commands::GetTicket => print_ticket(&client.get_ticket()?)?,
        Commands::GetVariable { name, info } => print_value(&client.get_variable(&name, info)?)?,
        Commands::SetVariable {
            name,
            value,
            extra_info,
        } => {
            let value = parse_json(&value)?;
            let extra_info = extra_info.as_deref().map(parse_json).transpose()?;
            print_value(&client.set_variable(&name, value, extra_info)?)?;
        }
        Commands::DeleteVariable { name } => print_value(&client.delete_variable(&name)?)?,
        Commands::Variables { full_info } => print_value(&client.get_variables(full_info)?)?,
        Commands::Call {
            class,
            method,
            args,
        } => {
            let args = args
                .iter()
                .map(|arg| parse_json(arg))
                .collect::<Result<Vec<_>>>()?;
            print_value(&client.proxy(&class).call(&method, args)?)?;
        }
    }

    Ok(())
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::new().with_address(args.address.as_str());

    if let Some(ticket) = &args.ticket {
        let ticket: Ticket = ticket.parse().context("Failed to parse ticket")?;
        if !ticket.valid() {
            bail!("Ticket does not hold a valid key");
        }
        return Ok(config.with_ticket(ticket));
    }

    if args.master_key {
        let key = KeyStore::new()
            .read_master_key()
            .context("Failed to read the master key")?;
        return Ok(config.with_key(key));
    }

    if let Some(key) = &args.key {
        config = config.with_key(Key::parse(key));
    }

    if let Some(user) = &args.user {
        config = config.with_user(user.as_str());

        if args.key.is_none() {
            if let Some(password) = &args.password {
                config = config.with_password(password.as_str());
            } else if let Some(key) = KeyStore::new().read_user_key(user).filter(Key::valid) {
                debug!("Using local key of {}", user);
                config = config.with_key(key);
            } else {
                config = config.with_password(read_password()?);
            }
        }
    }

    Ok(config)
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password")?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_json(text: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("Invalid JSON argument {text:?}"))?;
    Ok(Value::from(json))
}

fn print_value(value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to format reply")?;
    println!("{json}");
    Ok(())
}

fn print_ticket(ticket: &Ticket) -> Result<()> {
    println!("{ticket}");
    if !ticket.valid() {
        bail!("Server did not hand out a usable key");
    }
    Ok(())
}
