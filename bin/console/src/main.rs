use clap::{Parser, Subcommand};
use gymdesk_console::{
    app::{App, Step},
    command::{ConsoleCommand, parse_line},
    config::ConsoleConfig,
    error::ConsoleError,
};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Operator console for gymdesk.
#[derive(Debug, Parser)]
#[command(name = "gymdesk", version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Interactive console (default)
    Console,
    /// Sign in, email every student, and exit
    NotifyStudents {
        #[arg(long, env = "GYMDESK_EMAIL")]
        email: String,
        #[arg(long, env = "GYMDESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        subject: String,
        /// Message body; `{name}` becomes the student's name
        #[arg(long)]
        body: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,gymdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.mode.unwrap_or(Mode::Console) {
        Mode::Console => console().await,
        Mode::NotifyStudents {
            email,
            password,
            subject,
            body,
        } => notify_students(email, password, subject, body).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gymdesk stopped");
            ExitCode::FAILURE
        }
    }
}

async fn load_app() -> gymdesk_core::Result<App, ConsoleError> {
    let config = ConsoleConfig::from_env().map_err(|e| ConsoleError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");
    App::build(&config).await
}

async fn console() -> gymdesk_core::Result<(), ConsoleError> {
    let mut app = load_app().await?;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let banner = app.start().await;
    write_out(&mut stdout, &format!("{banner}\ntype `help` for commands\n")).await?;

    loop {
        write_out(&mut stdout, "gymdesk> ").await?;
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| ConsoleError::Io {
                details: e.to_string(),
            })?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let text = match parse_line(&line) {
            None => continue,
            // Help and usage errors are both rendered by clap.
            Some(Err(e)) => e.render().to_string(),
            Some(Ok(command)) => match app.execute(command).await {
                Step::Continue(text) => text,
                Step::Quit => break,
            },
        };
        write_out(&mut stdout, &format!("{}\n", text.trim_end())).await?;
    }

    app.shutdown().await;
    Ok(())
}

async fn notify_students(
    email: String,
    password: String,
    subject: String,
    body: String,
) -> gymdesk_core::Result<(), ConsoleError> {
    let mut app = load_app().await?;
    app.start().await;

    let mut outcome = Ok(());
    for command in [
        ConsoleCommand::Login { email, password },
        ConsoleCommand::Notify { subject, body },
    ] {
        match app.perform(command).await {
            Ok(text) => println!("{text}"),
            Err(report) => {
                outcome = Err(report);
                break;
            }
        }
    }

    app.shutdown().await;
    outcome
}

async fn write_out(
    stdout: &mut tokio::io::Stdout,
    text: &str,
) -> gymdesk_core::Result<(), ConsoleError> {
    stdout.write_all(text.as_bytes()).await.map_err(|e| ConsoleError::Io {
        details: e.to_string(),
    })?;
    stdout.flush().await.map_err(|e| ConsoleError::Io {
        details: e.to_string(),
    })?;
    Ok(())
}
