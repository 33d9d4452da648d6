use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use fhir::{BundleEntry, CodedReading, Observation, Patient, ResourceType};
use summary_core::constants::DEFAULT_REQUEST_TIMEOUT;
use summary_core::launch_store::generate_state;
use summary_core::oauth::build_authorize_url;
use summary_core::{
    config::build_http_client, render_summary_text, AuthorizationRequest, ChatSummaryGenerator,
    ClientConfig, ConfigValues, GeneratorConfig, ResourceFetcher, SummaryRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smart-summary")]
#[command(about = "SMART-on-FHIR patient summary tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a Patient bundle from an open FHIR server and print it
    Smoke {
        /// FHIR base URL
        #[arg(long, default_value = "http://localhost:8080/fhir")]
        base: String,
        /// Number of patients to request
        #[arg(long, default_value_t = 5)]
        count: u32,
    },
    /// List patients and their first observations from an open FHIR server
    Patients {
        /// FHIR base URL
        #[arg(long, default_value = "https://hapi.fhir.org/baseR4")]
        base: String,
        /// Number of patients to request
        #[arg(long, default_value_t = 5)]
        count: u32,
        /// Observations to print per patient
        #[arg(long, default_value_t = 3)]
        observations: usize,
        /// Retries for timed-out or refused requests
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// Print an authorization URL for the configured SMART client
    AuthorizeUrl,
    /// Generate a prose health summary from a patient's discharge summaries
    Summarize {
        /// Patient logical id
        #[arg(long)]
        patient_id: String,
        /// FHIR base URL
        #[arg(long, default_value = "http://hapi.fhir.org/baseR4")]
        base: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("summary_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Smoke { base, count }) => {
            let fetcher = open_fetcher(&base, 0)?;
            let count = count.to_string();
            let bundle = fetcher
                .search_raw(ResourceType::Patient, &[("_count", &count)], None)
                .await
                .with_context(|| format!("fetching patients from {base}"))?;
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        }
        Some(Commands::Patients {
            base,
            count,
            observations,
            retries,
        }) => {
            let fetcher = open_fetcher(&base, retries)?;
            list_patients(&fetcher, count, observations).await?;
        }
        Some(Commands::AuthorizeUrl) => {
            let config = ClientConfig::resolve(ConfigValues::from_env())?;
            let request = AuthorizationRequest::new(&config, generate_state());
            println!("{}", build_authorize_url(&config, &request));
        }
        Some(Commands::Summarize { patient_id, base }) => {
            let generator = ChatSummaryGenerator::new(GeneratorConfig::from_env()?)?;
            let fetcher = open_fetcher(&base, 0)?;
            let request = summary_request(&fetcher, &patient_id).await?;

            println!("\nGenerating health summary and clinical trial recommendations...\n");
            let text = render_summary_text(&generator, &request).await;
            println!("Health Summary and Recommendations:");
            println!("{text}");
        }
        None => {
            println!("Use 'smart-summary --help' for commands");
        }
    }

    Ok(())
}

fn open_fetcher(base: &str, retries: u32) -> anyhow::Result<ResourceFetcher> {
    let http = build_http_client(DEFAULT_REQUEST_TIMEOUT)?;
    Ok(ResourceFetcher::with_base(base, http, retries)?)
}

/// Print each patient with its first `limit` coded readings.
///
/// Failing to list patients is fatal; a failed observation search is reported and skipped.
async fn list_patients(
    fetcher: &ResourceFetcher,
    count: u32,
    limit: usize,
) -> anyhow::Result<()> {
    println!("Fetching patients...");
    let count = count.to_string();
    let patients = fetcher
        .fetch_bundle(ResourceType::Patient, &[("_count", &count)], None)
        .await
        .context("fetching patients")?;

    for patient in patients
        .iter()
        .filter_map(BundleEntry::resource)
        .filter_map(Patient::from_resource)
    {
        let Some(id) = patient.id.as_deref() else {
            tracing::warn!("Skipping patient without id");
            continue;
        };
        println!("\nPatient: {} (ID: {})", patient.display_name(), id);

        let subject = format!("Patient/{id}");
        match fetcher
            .fetch_bundle(ResourceType::Observation, &[("subject", &subject)], None)
            .await
        {
            Ok(entries) => {
                println!("  Found {} observations.", entries.len());
                for reading in entries
                    .iter()
                    .filter_map(BundleEntry::resource)
                    .take(limit)
                    .map(Observation::coded_reading)
                {
                    println!("    {}", format_reading(&reading));
                }
            }
            Err(e) => eprintln!("  Error fetching observations: {e}"),
        }
    }

    Ok(())
}

fn format_reading(reading: &CodedReading) -> String {
    format!("{}: {} {}", reading.code, reading.value, reading.unit)
}

/// Build the generator input from the Patient and its discharge-summary Observations.
async fn summary_request(
    fetcher: &ResourceFetcher,
    patient_id: &str,
) -> anyhow::Result<SummaryRequest> {
    let resource = fetcher
        .read_resource(ResourceType::Patient, patient_id, None)
        .await
        .with_context(|| format!("fetching patient {patient_id}"))?;
    let patient = Patient::from_resource(&resource)
        .ok_or_else(|| anyhow!("server did not return a Patient for {patient_id}"))?;
    println!("Retrieved patient data for {patient_id}");

    let entries = fetcher
        .fetch_bundle(
            ResourceType::Observation,
            &[("patient", patient_id), ("category", "discharge-summary")],
            None,
        )
        .await
        .with_context(|| format!("fetching discharge summaries for {patient_id}"))?;
    if entries.is_empty() {
        println!("No discharge summaries found for patient {patient_id}");
    }

    Ok(SummaryRequest {
        patient_id: patient.id.clone().unwrap_or_else(|| "Unknown".into()),
        display_name: patient.full_name(),
        conditions: Observation::condition_texts(&entries),
    })
}
