mod cli;

use std::process::ExitCode;

use case_status_core::{generate_traffic, ApiClient, ClientError, Clock, Transport};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

/// JSON shape printed when an operation fails.
#[derive(Debug, Serialize)]
struct ErrorView<'a> {
    error: &'a str,
    code: Option<&'a str>,
    status: Option<u16>,
    trace_id: Option<&'a str>,
}

impl<'a> From<&'a ClientError> for ErrorView<'a> {
    fn from(err: &'a ClientError) -> Self {
        Self {
            error: &err.message,
            code: err.code.as_deref(),
            status: err.status,
            trace_id: err.trace_id.as_deref(),
        }
    }
}

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut client = ApiClient::new(cli.credentials(), cli.client_config());
    run(&mut client, &cli.command)
}

fn run<T: Transport, C: Clock>(
    client: &mut ApiClient<T, C>,
    command: &Command,
) -> color_eyre::Result<ExitCode> {
    match command {
        Command::Auth => {
            let result = client.authenticate().map(|_| client.get_token_info());
            report(result)
        }
        Command::Status { receipts } if receipts.len() == 1 => {
            report(client.get_case_status(&receipts[0]))
        }
        Command::Status { receipts } => {
            let outcome = client.get_case_status_batch(receipts);
            print_json(&outcome)?;
            Ok(if outcome.errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::FoiaCreate { .. } => match command.foia_request() {
            Some(request) => report(client.create_foia_request(&request)),
            None => Ok(ExitCode::FAILURE),
        },
        Command::FoiaStatus { number } => report(client.get_foia_status(number)),
        Command::TestConnection => {
            let connection = client.test_connection();
            print_json(&connection)?;
            let ok = connection.authentication.success
                && (connection.case_status_api.success
                    || connection.case_status_api.test_receipt.is_none());
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::TokenInfo => {
            print_json(&client.get_token_info())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Debug => {
            print_json(&client.get_debug_info())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Headers => {
            let result = client.authenticate().map(|_| {
                client
                    .request_headers()
                    .into_iter()
                    .collect::<std::collections::BTreeMap<_, _>>()
            });
            report(result)
        }
        Command::Traffic { .. } => match command.traffic_plan() {
            Some(plan) => {
                let traffic = generate_traffic(client, &plan);
                print_json(&traffic)?;
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        },
    }
}

fn report<T: Serialize>(result: Result<T, ClientError>) -> color_eyre::Result<ExitCode> {
    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(error = %err, "request failed");
            print_json(&ErrorView::from(&err))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
