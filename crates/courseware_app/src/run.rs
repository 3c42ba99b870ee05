use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use courseware_core::{folder_name, CourseCatalog};
use courseware_engine::{
    ensure_output_dir, log_in, CourseOutcome, CourseRun, FetchSettings, FirefoxSession,
    IngestSettings, Ingester, Normalizer, ReqwestFetcher, RunSummary, SignIn,
};
use engine_logging::{engine_info, engine_warn};
use url::Url;

use crate::cli::Cli;
use crate::config::{self, RunConfig};

pub fn run(cli: &Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    // Log context is per thread, so everything runs on this one.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match &cli.ingest {
        Some(listing) => runtime.block_on(ingest(cli, listing)),
        None => runtime.block_on(download_courses(cli)),
    }
}

async fn download_courses(cli: &Cli) -> Result<()> {
    let config = RunConfig::from_cli(cli, config::process_env)?;
    let catalog = CourseCatalog::load(&config.catalog_path)
        .with_context(|| format!("cannot use catalog {:?}", config.catalog_path))?;
    ensure_output_dir(&config.run.save_root)?;
    engine_info!("Saving files to {:?}", config.run.save_root);

    let session = FirefoxSession::start(&config.browser)
        .await
        .context("could not start a browser session; is geckodriver running?")?;
    let outcome = sign_in_and_run(&session, &config, &catalog).await;
    if let Err(err) = session.quit().await {
        engine_warn!("Browser did not shut down cleanly: {}", err);
    }

    report(&outcome?);
    Ok(())
}

async fn sign_in_and_run(
    session: &FirefoxSession,
    config: &RunConfig,
    catalog: &CourseCatalog,
) -> Result<RunSummary> {
    let sign_in = log_in(session, &config.login, &config.credentials)
        .await
        .context("sign-in failed")?;
    if let SignIn::ManualPrompt(_) = sign_in {
        wait_for_manual_sign_in().context("no confirmation of the manual sign-in")?;
    }
    Ok(CourseRun::new(session, &config.normalizer, &config.run)
        .run(catalog)
        .await)
}

/// Blocks until the user confirms they answered the browser's sign-in
/// dialogue.
fn wait_for_manual_sign_in() -> io::Result<()> {
    print!("Press enter after entering username and password in the browser ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn report(summary: &RunSummary) {
    for course in &summary.courses {
        match &course.outcome {
            CourseOutcome::Processed(units) => {
                let completed = units.iter().filter(|unit| unit.is_completed()).count();
                engine_info!(
                    "{}: {}/{} unit(s) downloaded",
                    course.course_name,
                    completed,
                    units.len()
                );
                for unit in units.iter().filter(|unit| !unit.is_completed()) {
                    engine_warn!("{} / {}: {:?}", course.course_name, unit.unit_name, unit.phase);
                }
            }
            CourseOutcome::NoContent => {
                engine_info!("{}: no content", course.course_name);
            }
            CourseOutcome::Failed(reason) => {
                engine_warn!("{}: failed ({})", course.course_name, reason);
            }
        }
    }
}

async fn ingest(cli: &Cli, listing: &Url) -> Result<()> {
    let credentials = config::ingest_credentials(config::process_env)?;
    let target_dir = cli.save_root().join(folder_name(&cli.ingest_folder));
    ensure_output_dir(&target_dir)?;

    let settings = IngestSettings::new(target_dir, credentials);
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let normalizer = Normalizer::default();
    let summary = Ingester::new(&fetcher, &normalizer, &settings)
        .run(listing.as_str())
        .await
        .with_context(|| format!("cannot ingest {listing}"))?;

    engine_info!(
        "Ingested {} of {} file(s) into {:?}; {} archive(s) extracted",
        summary.downloaded.len(),
        summary.links.len(),
        settings.target_dir,
        summary.extractions.len()
    );
    for (url, reason) in &summary.failed {
        engine_warn!("Not downloaded: {} ({})", url, reason);
    }
    Ok(())
}
