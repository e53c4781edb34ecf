use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newsletter_digest::config::{check_window_hours, Config};
use newsletter_digest::digest::{GenerationSettings, OpenAiEndpoint, Summarizer};
use newsletter_digest::gmail_client::GmailClient;
use newsletter_digest::slack_notifier::SlackNotifier;
use newsletter_digest::{DigestPipeline, PipelineSettings, RunOutcome};

#[derive(Parser, Clone)]
#[command(name = "newsletter-digest")]
#[command(about = "Daily AI-summarized digest of your newsletter emails")]
#[command(version = "0.1.0")]
struct Args {
    /// Dry-run mode: build the digest without sending it
    #[arg(short, long)]
    dry_run: bool,

    /// In dry-run mode, write the HTML digest to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Daemon mode: run on the configured daily schedule
    #[arg(long)]
    daemon: bool,

    /// Look back this many hours (overrides DIGEST_WINDOW_HOURS)
    #[arg(short = 'w', long)]
    window_hours: Option<i64>,

    /// Maximum number of threads to fetch (overrides DIGEST_MAX_THREADS)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Check configuration without connecting
    #[arg(long)]
    check_config: bool,

    /// List Gmail labels and exit
    #[arg(long)]
    list_labels: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting newsletter digest in DRY-RUN mode");
    } else {
        info!("🚀 Starting newsletter digest");
    }

    let mut config = Config::new()?;

    if let Some(hours) = args.window_hours {
        config.digest.window_hours = check_window_hours(hours)?;
    }
    if let Some(limit) = args.limit {
        config.digest.max_threads = limit;
    }

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("📧 Gmail API OAuth2");
        println!("🔑 Credentials: {}", config.gmail.credentials_path);
        println!("💾 Token cache: {}", config.gmail.token_cache_path);
        println!("🤖 Model: {} ({})", config.openai.model, config.openai.base_url);
        println!("🏷️  Label: {}", config.digest.label);
        println!("⏱️  Window: {} hours, up to {} threads", config.digest.window_hours, config.digest.max_threads);
        println!(
            "📬 Recipient: {}",
            config.digest.recipient.as_deref().unwrap_or("<Gmail account address>")
        );
        return Ok(());
    }

    if args.list_labels {
        let gmail = GmailClient::new(&config.gmail).await?;
        gmail.list_labels(&config.digest.label).await?;
        return Ok(());
    }

    if args.daemon {
        info!("🔄 Starting in daemon mode");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    run_once(config, args.dry_run, args.output).await
}

/// One run with operator notification of the outcome.
/// Takes owned values so the future can be handed to the scheduler.
async fn run_once(config: Config, dry_run: bool, output: Option<PathBuf>) -> Result<()> {
    let slack = config.slack.as_ref().and_then(|slack_config| match SlackNotifier::new(slack_config) {
        Ok(notifier) => Some(notifier),
        Err(e) => {
            warn!("⚠️  Unable to initialize Slack notifier: {} - notifications disabled", e);
            None
        }
    });

    match run_digest(&config, dry_run, output.as_deref()).await {
        Ok(outcome) => {
            if let Some(slack) = &slack {
                let _ = slack.notify_outcome(&outcome).await;
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ Digest run failed: {:#}", e);
            if let Some(slack) = &slack {
                let _ = slack.notify_run_failed(&format!("{:#}", e)).await;
            }
            Err(e)
        }
    }
}

async fn run_digest(config: &Config, dry_run: bool, output: Option<&Path>) -> Result<RunOutcome> {
    let gmail = Arc::new(
        GmailClient::new(&config.gmail)
            .await
            .context("Unable to connect to Gmail API")?,
    );

    let recipient = match &config.digest.recipient {
        Some(recipient) => recipient.clone(),
        None => gmail.user_email().await?,
    };

    let endpoint = OpenAiEndpoint::new(&config.openai).context("Unable to create LLM client")?;
    let summarizer = Summarizer::new(endpoint, GenerationSettings::from(&config.openai));
    let settings = PipelineSettings::from_config(&config.digest, recipient);

    let pipeline = DigestPipeline::new(gmail.clone(), gmail, summarizer, settings);
    let outcome = pipeline.run(Utc::now(), dry_run).await?;

    match &outcome {
        RunOutcome::NothingToSend => info!("📭 Nothing to send this run"),
        RunOutcome::Built(document) => {
            println!("\n{}", "=".repeat(80));
            println!("🧪 DRY-RUN - {}", document.subject);
            println!("{}", "=".repeat(80));
            match output {
                Some(path) => {
                    document.write_html(path)?;
                    println!("💾 HTML digest written to {}", path.display());
                }
                None => println!("{}", document.plain_text),
            }
        }
        RunOutcome::Delivered { entries, recipient } => {
            info!("✅ Run completed: {} newsletter(s) delivered to {}", entries, recipient);
        }
    }

    Ok(outcome)
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    if !config.scheduler.enabled {
        error!("❌ Daemon mode requires SCHEDULER_ENABLED=true in the configuration");
        anyhow::bail!("Scheduler not enabled in configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ No schedule times defined (SCHEDULER_TIMES)");
        anyhow::bail!("No schedule times defined");
    }

    info!("📅 Configured digest times: {:?}", config.scheduler.schedule_times);

    let scheduler = JobScheduler::new().await?;

    for schedule_time in &config.scheduler.schedule_times {
        let Some((hour, minute)) = parse_schedule_time(schedule_time) else {
            error!("❌ Invalid schedule time: {}. Use the HH:MM format", schedule_time);
            continue;
        };

        // Cron format: "sec min hour * * *" (every day)
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Adding scheduled job: {} (cron: {})", schedule_time, cron_expr);

        let config_clone = config.clone();
        let dry_run = args.dry_run;
        let output = args.output.clone();
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let output = output.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Scheduled run at {} - building digest...", schedule_time);

                // Failures are already logged and reported; the next run supersedes this one
                if run_once(config, dry_run, output).await.is_ok() {
                    info!("✅ Scheduled run at {} finished", schedule_time);
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;

    info!("✅ Daemon started. Waiting for scheduled times...");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}

/// "08:00" -> (8, 0)
fn parse_schedule_time(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsletter_digest::config::{DigestConfig, GmailConfig, OpenAiConfig, SchedulerConfig};

    fn sample_config() -> Config {
        Config {
            gmail: GmailConfig {
                credentials_path: "./client_credentials.json".to_string(),
                token_cache_path: "./gmail-token-cache.json".to_string(),
            },
            openai: OpenAiConfig {
                api_key: "sk-test".to_string(),
                model: "gpt-4o".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                max_tokens: 3000,
                temperature: 0.7,
                top_p: 1.0,
                timeout_secs: 45,
            },
            digest: DigestConfig {
                label: "substack".to_string(),
                window_hours: 24,
                max_threads: 50,
                concurrency: 3,
                recipient: None,
                greeting_name: None,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                schedule_times: vec!["08:00".to_string()],
            },
            slack: None,
        }
    }

    fn assert_schedulable<F: std::future::Future + Send + 'static>(_future: &F) {}

    #[test]
    fn test_run_once_can_be_scheduled() {
        // Job::new_async needs a Send + 'static future; it is never polled here
        let future = run_once(sample_config(), true, Some(PathBuf::from("digest.html")));
        assert_schedulable(&future);
    }

    #[test]
    fn test_parse_schedule_time() {
        assert_eq!(parse_schedule_time("08:00"), Some((8, 0)));
        assert_eq!(parse_schedule_time(" 19:45 "), Some((19, 45)));
        assert_eq!(parse_schedule_time("24:00"), None);
        assert_eq!(parse_schedule_time("8"), None);
        assert_eq!(parse_schedule_time("ab:cd"), None);
    }
}
