use datacenter_import_lib::{
    build_info,
    cli::parse_args,
    config::Config,
    import,
    logging::{format_error_report, init_logging},
};
use dotenv::dotenv;
use log::{debug, error, info};
use std::time::Instant;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = parse_args();
    init_logging("datacenter_import", &args.log_level);
    info!(
        "Starting datacenter import {}",
        build_info::VERSION_WITH_COMMIT
    );

    if let Err(err) = args.validate() {
        eprintln!("{err}");
        std::process::exit(2);
    }

    let config = match Config::from_env() {
        Ok(config) => args.apply(config),
        Err(err) => {
            eprintln!("{}", format_error_report(&err));
            std::process::exit(2);
        }
    };
    debug!("Config loaded: {:?}", config);

    let start_time = Instant::now();
    match import::run(&config, args.import_options()).await {
        Ok(counts) => {
            let total: usize = counts.values().sum();
            info!(
                "Import finished: {} requests in {:?}",
                total,
                start_time.elapsed()
            );
        }
        Err(err) => {
            error!("{}", format_error_report(&err));
            std::process::exit(1);
        }
    }
}
