// src/main.rs

use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

use ponto_backend::config::AppState;
use ponto_backend::models::hr::{Actor, StaffRole};
use ponto_backend::models::job::JobRun;

fn usage() -> ! {
    eprintln!("uso: ponto-backend daily [AAAA-MM-DD]");
    eprintln!("     ponto-backend monthly [AAAA-MM] [--finalize]");
    std::process::exit(2);
}

/// Ator que assina a finalização quando a varredura mensal roda com
/// --finalize. O id vem do ambiente: a finalização sempre tem um responsável.
fn finalizer_from_env() -> Result<Actor, anyhow::Error> {
    let id: Uuid = std::env::var("FINALIZER_ACTOR_ID")
        .context("--finalize exige FINALIZER_ACTOR_ID no ambiente")?
        .parse()
        .context("FINALIZER_ACTOR_ID não é um UUID válido")?;
    Ok(Actor {
        id,
        name: "Rotina mensal".to_string(),
        role: StaffRole::Operations,
        has_override_authority: false,
    })
}

fn print_summary(run: &JobRun) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(run)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let state = AppState::new().await?;
    sqlx::migrate!("./migrations").run(&state.pool).await?;
    tracing::info!("✅ Migrações aplicadas.");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("daily") => {
            let date: Option<NaiveDate> = args
                .get(1)
                .map(|s| s.parse())
                .transpose()
                .context("data inválida, use AAAA-MM-DD")?;
            let run = state.job_service.run_daily_job(date).await?;
            print_summary(&run)?;
        }
        Some("monthly") => {
            let period = args.get(1).filter(|a| !a.starts_with("--"));
            let (year, month) = match period {
                Some(p) => {
                    let (y, m) = p
                        .split_once('-')
                        .context("período inválido, use AAAA-MM")?;
                    (
                        Some(y.parse().context("ano inválido")?),
                        Some(m.parse().context("mês inválido")?),
                    )
                }
                None => (None, None),
            };
            let finalizer = if args.iter().any(|a| a == "--finalize") {
                Some(finalizer_from_env()?)
            } else {
                None
            };
            let run = state
                .job_service
                .run_monthly_job(year, month, finalizer.as_ref())
                .await?;
            print_summary(&run)?;
        }
        _ => usage(),
    }

    Ok(())
}
