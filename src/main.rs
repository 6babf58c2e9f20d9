use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ldap_backend::{DirectoryAuthenticator, ProviderConfig, telemetry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "LDAP_BACKEND_PASSWORD";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, short, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Verify a password and print the resolved identity.
    ///
    /// The password is read from `LDAP_BACKEND_PASSWORD` or, when unset,
    /// from the first line of standard input.
    Verify { username: String },
    /// Print the effective configuration, without secrets.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::setup_logging();

    let args = Args::parse();
    let config = match ProviderConfig::default().path(args.config).read() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        },
    };

    match args.cmd {
        Commands::Config => match serde_yaml::to_string(&config) {
            Ok(yaml) => {
                print!("{yaml}");
                ExitCode::SUCCESS
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot serialize configuration");
                ExitCode::FAILURE
            },
        },
        Commands::Verify { username } => verify(&config, &username).await,
    }
}

async fn verify(config: &ProviderConfig, username: &str) -> ExitCode {
    let authenticator = match DirectoryAuthenticator::from_config(config) {
        Ok(authenticator) => authenticator,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        },
    };

    let password = match read_password(
        std::env::var(PASSWORD_ENV).ok(),
        BufReader::new(tokio::io::stdin()),
    )
    .await
    {
        Ok(password) => password,
        Err(err) => {
            tracing::error!(error = %err, "cannot read password from stdin");
            return ExitCode::FAILURE;
        },
    };

    match authenticator.verify(username, &password).await {
        Ok(identity) => match serde_json::to_string(&identity) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot serialize identity");
                ExitCode::FAILURE
            },
        },
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        },
    }
}

/// Password from the environment, else the first line of `input` without its
/// line ending.
async fn read_password<R>(
    env: Option<String>,
    mut input: R,
) -> std::io::Result<Zeroizing<String>>
where
    R: AsyncBufRead + Unpin,
{
    if let Some(password) = env {
        return Ok(Zeroizing::new(password));
    }

    let mut line = Zeroizing::new(String::new());
    input.read_line(&mut line).await?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_from_env() {
        let password = read_password(Some("from-env".into()), &b"from-stdin\n"[..])
            .await
            .unwrap();
        assert_eq!(password.as_str(), "from-env");
    }

    #[tokio::test]
    async fn test_password_from_stdin() {
        for (input, expected) in [
            (&b"s3cret\n"[..], "s3cret"),
            (&b"s3cret\r\n"[..], "s3cret"),
            (&b"s3cret"[..], "s3cret"),
            (&b"  spaced out \nsecond line\n"[..], "  spaced out "),
            (&b""[..], ""),
        ] {
            let password = read_password(None, input).await.unwrap();
            assert_eq!(password.as_str(), expected);
        }
    }
}
