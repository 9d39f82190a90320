use std::process::ExitCode;
use std::sync::mpsc;

use clap::Parser;
use serde::Serialize;

use kaihistory::cli::{Cli, Cmd};
use kaihistory::errors::ApiError;
use kaihistory::state::{AppCommand, IdentityUpdate};
use kaihistory::{AppError, SettingsStore, WorkspaceService};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("kaihistory=debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = match cli.settings_file {
        Some(path) => SettingsStore::at_path(path),
        None => SettingsStore::open_default(),
    };
    let service = WorkspaceService::new(store);

    match run(&service, cli.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let api = ApiError::from(&e);
            match serde_json::to_string(&api) {
                Ok(body) => eprintln!("{}", body),
                Err(_) => eprintln!("{}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(service: &WorkspaceService, cmd: Cmd) -> Result<(), AppError> {
    match cmd {
        Cmd::State => emit(&service.app_state()),
        Cmd::Open { path } => emit(&service.run_command(AppCommand::OpenFolder { path })?),
        Cmd::Init => emit(&service.run_command(AppCommand::InitializeProject)?),
        Cmd::Start { name } => emit(&service.run_command(AppCommand::StartWork { name })?),
        Cmd::Resume => emit(&service.run_command(AppCommand::ResumeWork)?),
        Cmd::Save { message } => emit(&service.run_command(AppCommand::SaveHistory { message })?),
        Cmd::Complete => emit(&service.run_command(AppCommand::CompleteWork)?),
        Cmd::ResetMain => emit(&service.run_command(AppCommand::ResetMain)?),
        Cmd::ForceMain => emit(&service.run_command(AppCommand::ForceMain)?),
        Cmd::Stage { paths } => emit(&service.run_command(AppCommand::Stage { paths })?),
        Cmd::Unstage { paths } => emit(&service.run_command(AppCommand::Unstage { paths })?),
        Cmd::Discard { paths } => emit(&service.run_command(AppCommand::Discard { paths })?),
        Cmd::DiscardAll => emit(&service.run_command(AppCommand::DiscardAll)?),
        Cmd::Settings { name, email } => match (name, email) {
            (Some(user_name), Some(user_email)) => {
                let state = service.run_command(AppCommand::UpdateSettings {
                    settings: IdentityUpdate {
                        user_name,
                        user_email,
                    },
                })?;
                emit(&state.settings)
            }
            _ => emit(&service.app_state().settings),
        },
        Cmd::Diff { path, mode } => emit(&service.diff(&path, mode)?),
        Cmd::Watch { path } => watch(service, path),
        Cmd::Refresh => emit(&service.run_command(AppCommand::Refresh)?),
    }
}

/// Open the folder, then print a fresh snapshot every time the debounced
/// watcher reports a change. Runs until interrupted.
fn watch(service: &WorkspaceService, path: String) -> Result<(), AppError> {
    let (tx, rx) = mpsc::channel::<()>();
    service.subscribe(move || {
        let _ = tx.send(());
    });
    emit(&service.run_command(AppCommand::OpenFolder { path })?)?;
    while rx.recv().is_ok() {
        emit(&service.app_state())?;
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| AppError::Backend(e.to_string()))?;
    println!("{}", body);
    Ok(())
}
