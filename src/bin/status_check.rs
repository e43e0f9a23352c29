use clap::Parser;
use datacenter_import_lib::{
    api_client::{ApiClient, DatacenterApi},
    build_info,
    config::Config,
    logging::{format_error_report, init_logging},
};
use dotenv::dotenv;
use log::{error, info, warn};
use yansi::Paint;

#[derive(Debug, Parser)]
#[command(
    about = "Check that the datacenter api is reachable",
    version = build_info::VERSION_WITH_COMMIT
)]
struct Args {
    #[arg(long = "api-url")]
    /// Base url of the api, overrides API_URL
    api_url: Option<String>,

    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = Args::parse();
    init_logging("status_check", &args.log_level);

    let api_url = match (&args.api_url, Config::from_env()) {
        (Some(url), _) => url.clone(),
        (None, Ok(config)) => config.api_url,
        (None, Err(err)) => {
            eprintln!("{}", format_error_report(&err));
            std::process::exit(2);
        }
    };

    let client = match ApiClient::new(&api_url) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", format_error_report(&err));
            std::process::exit(2);
        }
    };

    info!("Checking api status at {}...", client.base_url());
    match client.status().await {
        Ok(response) if response.status == 200 => {
            info!("{}", "... done! Everything looks good!".green());
        }
        Ok(response) => {
            warn!(
                "{} {}",
                format!("... api responded with {}", response.status).yellow(),
                response.body
            );
            std::process::exit(1);
        }
        Err(err) => {
            error!("{}", format_error_report(&err));
            error!(
                "{}",
                "Could not reach the api. Check your network connection and API_URL.".red()
            );
            std::process::exit(1);
        }
    }
}
